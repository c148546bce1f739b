//! Replay a short reading session and print the emitted records

use interact_telemetry::config::EngineConfig;
use interact_telemetry::engine::Engine;
use interact_telemetry::environment::UserAgentProbe;
use interact_telemetry::page::PageSnapshot;
use interact_telemetry::trace::{TraceAdapter, TraceReplayer};
use interact_telemetry::transport::NdjsonTransport;

fn main() {
    let trace = r#"
{"at_ms":0,"type":"layout","url":"https://example.com/articles/rust","viewport":{"height":900},"sections":[{"id":"intro","name":"Introduction","top":0,"height":700},{"id":"ownership","name":"Ownership","top":700,"height":1800},{"id":"outro","name":"Wrapping up","top":2500,"height":600}]}
{"at_ms":150,"type":"transport_open"}
{"at_ms":900,"type":"pointer_move"}
{"at_ms":1800,"type":"scroll","scroll_y":800}
{"at_ms":3200,"type":"scroll","scroll_y":1200}
{"at_ms":9000,"type":"tick"}
{"at_ms":9500,"type":"pointer_move"}
{"at_ms":10700,"type":"scroll","scroll_y":2400}
{"at_ms":12000,"type":"unload"}
"#;

    let events = match TraceAdapter::parse_ndjson(trace) {
        Ok(events) => events,
        Err(e) => {
            eprintln!("Error: {e}");
            return;
        }
    };

    let probe = UserAgentProbe::new(
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 \
         (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
        Some("https://news.example.org/".to_string()),
    );
    let transport = NdjsonTransport::new(std::io::stdout()).flushing(true);

    match Engine::new(EngineConfig::default(), "demo-visitor", Box::new(probe), transport) {
        Ok(engine) => {
            let mut replayer = TraceReplayer::new(engine, PageSnapshot::new("about:blank", 900.0));
            let records = replayer.replay(&events);
            eprintln!("{} records emitted", records.len());
        }
        Err(e) => eprintln!("Error: {e:?}"),
    }
}
