//! Text runs of a WordprocessingML document part

use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::reader::NsReader;

/// Namespace of `w:` elements
pub const WORDPROCESSING_NS: &[u8] = b"http://schemas.openxmlformats.org/wordprocessingml/2006/main";

/// Contents of every `w:t` element in document order
///
/// Fails on malformed XML; a truncated part never yields partial text.
pub fn collect_text_runs(xml: &[u8]) -> Result<Vec<String>, String> {
    let mut reader = NsReader::from_reader(xml);
    let mut buf = Vec::new();
    let mut runs = Vec::new();
    let mut current: Option<String> = None;

    loop {
        match reader.read_resolved_event_into(&mut buf) {
            Ok((ref ns, Event::Start(ref e))) if is_text_run(ns, e.local_name().as_ref()) => {
                current = Some(String::new());
            }
            Ok((ref ns, Event::End(ref e))) if is_text_run(ns, e.local_name().as_ref()) => {
                if let Some(run) = current.take() {
                    runs.push(run);
                }
            }
            Ok((_, Event::Text(ref e))) => {
                if let Some(run) = current.as_mut() {
                    let text = e.unescape().map_err(|e| e.to_string())?;
                    run.push_str(&text);
                }
            }
            Ok((_, Event::CData(ref e))) => {
                if let Some(run) = current.as_mut() {
                    run.push_str(&String::from_utf8_lossy(e));
                }
            }
            Ok((_, Event::Eof)) => break,
            Ok(_) => {}
            Err(e) => return Err(format!("malformed XML: {e}")),
        }
        buf.clear();
    }

    Ok(runs)
}

fn is_text_run(ns: &ResolveResult, local_name: &[u8]) -> bool {
    matches!(ns, ResolveResult::Bound(Namespace(uri)) if *uri == WORDPROCESSING_NS) && local_name == b"t"
}

/// Normalized document text: non-empty runs joined by a single space, trimmed
pub fn document_text(xml: &[u8]) -> Option<String> {
    let runs = collect_text_runs(xml).ok()?;
    let joined = runs
        .iter()
        .filter(|run| !run.is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ");
    Some(joined.trim().to_string())
}
