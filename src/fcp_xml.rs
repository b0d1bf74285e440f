//! # FCP7 XML Module
//!
//! Esporta un edit plan come documento Final Cut Pro 7 (`xmeml` v5),
//! importabile manualmente nell'applicazione di editing.
//!
//! ## Struttura:
//! - Una `sequence` con il nome della timeline e una sola traccia video
//! - Un `clipitem` per ogni cut, uno dopo l'altro senza gap
//! - Ogni file sorgente è definito una volta sola, poi solo referenziato per id
//!
//! ## Frame rate:
//! - Il rate di ogni clip viene dal sidecar (`fps` misurato da ffprobe)
//! - Rate sconosciuto: 25 fps
//! - Rate frazionari (23.976, 29.97) diventano timebase intera + `ntsc` TRUE
//! - La sequence usa il rate della prima cut

use crate::file_manager::FileManager;
use crate::key_moments::EditPlan;
use crate::sidecar::Sidecar;
use anyhow::Result;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use reqwest::Url;
use std::collections::HashMap;
use std::fmt::Display;
use std::path::Path;

const DEFAULT_FPS: f64 = 25.0;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Rate {
    fps: f64,
}

impl Rate {
    fn new(fps: Option<f64>) -> Self {
        let fps = fps.filter(|f| f.is_finite() && *f > 0.0).unwrap_or(DEFAULT_FPS);
        Self { fps }
    }

    fn timebase(&self) -> u64 {
        self.fps.round() as u64
    }

    fn ntsc(&self) -> bool {
        (self.fps - self.fps.round()).abs() > 0.001
    }

    fn frames(&self, seconds: f64) -> u64 {
        (seconds * self.fps).round().max(0.0) as u64
    }
}

/// Thin layer over the `quick-xml` event writer
struct XmlDocument {
    writer: Writer<Vec<u8>>,
}

impl XmlDocument {
    fn new() -> Self {
        Self {
            writer: Writer::new_with_indent(Vec::new(), b' ', 2),
        }
    }

    fn prologue(&mut self) -> Result<()> {
        self.writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
        self.writer.write_event(Event::DocType(BytesText::from_escaped("xmeml")))?;
        Ok(())
    }

    fn open(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<()> {
        let start = BytesStart::new(name).with_attributes(attributes.iter().copied());
        self.writer.write_event(Event::Start(start))?;
        Ok(())
    }

    fn close(&mut self, name: &str) -> Result<()> {
        self.writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }

    fn empty(&mut self, name: &str, attributes: &[(&str, &str)]) -> Result<()> {
        let element = BytesStart::new(name).with_attributes(attributes.iter().copied());
        self.writer.write_event(Event::Empty(element))?;
        Ok(())
    }

    /// `<name>value</name>`, with the value escaped
    fn leaf(&mut self, name: &str, value: impl Display) -> Result<()> {
        self.open(name, &[])?;
        self.writer
            .write_event(Event::Text(BytesText::new(&value.to_string())))?;
        self.close(name)
    }

    fn rate(&mut self, rate: Rate) -> Result<()> {
        self.open("rate", &[])?;
        self.leaf("timebase", rate.timebase())?;
        self.leaf("ntsc", if rate.ntsc() { "TRUE" } else { "FALSE" })?;
        self.close("rate")
    }

    fn finish(self) -> Result<String> {
        Ok(String::from_utf8(self.writer.into_inner())?)
    }
}

/// `file://` URL the editing host can relink from
fn path_url(path: &str) -> String {
    Url::from_file_path(path)
        .map(|url| url.to_string())
        .unwrap_or_else(|_| format!("file://{}", path))
}

/// Render the plan as an FCP7 XML document.
///
/// `sidecars` supply each source's frame rate and duration; a source with
/// no sidecar is written at the default rate.
pub fn render(plan: &EditPlan, sidecars: &[Sidecar]) -> Result<String> {
    let by_path: HashMap<&str, &Sidecar> = sidecars.iter().map(|s| (s.file_path.as_str(), s)).collect();
    let rate_of = |source: &str| Rate::new(by_path.get(source).and_then(|s| s.fps));

    let sequence_rate = plan
        .cuts
        .first()
        .map(|cut| rate_of(&cut.source_file))
        .unwrap_or_else(|| Rate::new(None));

    // Cuts are laid end to end on the sequence timebase
    let mut placed = Vec::with_capacity(plan.cuts.len());
    let mut cursor = 0;
    for cut in &plan.cuts {
        let length = sequence_rate.frames(cut.end_sec - cut.start_sec).max(1);
        placed.push((cut, cursor, cursor + length));
        cursor += length;
    }

    let mut xml = XmlDocument::new();
    xml.prologue()?;
    xml.open("xmeml", &[("version", "5")])?;
    xml.open("sequence", &[("id", "sequence-1")])?;
    xml.leaf("name", &plan.timeline_name)?;
    xml.leaf("duration", cursor)?;
    xml.rate(sequence_rate)?;
    xml.open("media", &[])?;
    xml.open("video", &[])?;
    xml.open("track", &[])?;

    let mut file_ids: HashMap<&str, String> = HashMap::new();
    for (index, (cut, start, end)) in placed.into_iter().enumerate() {
        let rate = rate_of(&cut.source_file);
        let name = FileManager::display_name(Path::new(&cut.source_file));
        let source_in = rate.frames(cut.start_sec);
        let source_out = rate.frames(cut.end_sec).max(source_in + 1);
        let source_duration = by_path
            .get(cut.source_file.as_str())
            .and_then(|s| s.duration)
            .map(|d| rate.frames(d))
            .unwrap_or(source_out)
            .max(source_out);

        let clip_id = format!("clipitem-{}", index + 1);
        xml.open("clipitem", &[("id", clip_id.as_str())])?;
        xml.leaf("name", &name)?;
        xml.leaf("duration", source_duration)?;
        xml.rate(rate)?;
        xml.leaf("start", start)?;
        xml.leaf("end", end)?;
        xml.leaf("in", source_in)?;
        xml.leaf("out", source_out)?;

        match file_ids.get(cut.source_file.as_str()) {
            Some(file_id) => xml.empty("file", &[("id", file_id.as_str())])?,
            None => {
                let file_id = format!("file-{}", file_ids.len() + 1);
                xml.open("file", &[("id", file_id.as_str())])?;
                xml.leaf("name", &name)?;
                xml.leaf("pathurl", path_url(&cut.source_file))?;
                xml.rate(rate)?;
                xml.leaf("duration", source_duration)?;
                xml.open("media", &[])?;
                xml.empty("video", &[])?;
                xml.close("media")?;
                xml.close("file")?;
                file_ids.insert(cut.source_file.as_str(), file_id);
            }
        }
        xml.close("clipitem")?;
    }

    xml.close("track")?;
    xml.close("video")?;
    xml.close("media")?;
    xml.close("sequence")?;
    xml.close("xmeml")?;
    xml.finish()
}
