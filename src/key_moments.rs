//! # Key Moments Module
//!
//! Assembla un edit plan deterministico dai sidecar già caricati: una cut
//! per ogni segmento utilizzabile di ogni clip video.
//!
//! ## Regole:
//! - Sidecar audio ignorati
//! - Filtro opzionale sugli stem dei file (vuoto = nessun filtro)
//! - Segmenti con `end_sec <= start_sec` scartati
//! - Ordinamento per `(source_file, start_sec)`, indipendente dall'ordine di input
//! - Un plan vuoto è un risultato valido, decide il chiamante

use crate::sidecar::Sidecar;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const DEFAULT_TIMELINE_NAME: &str = "Key Moments";

/// Track every key moment is placed on
const KEY_MOMENTS_TRACK: u32 = 1;

/// One source range placed on the timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cut {
    pub track: u32,
    pub source_file: String,
    pub start_sec: f64,
    pub end_sec: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditPlan {
    pub timeline_name: String,
    pub cuts: Vec<Cut>,
}

impl EditPlan {
    pub fn is_empty(&self) -> bool {
        self.cuts.is_empty()
    }
}

/// Build the plan from loaded sidecars
pub fn assemble(sidecars: &[Sidecar], timeline_name: &str, filter: Option<&HashSet<String>>) -> EditPlan {
    let filter = filter.filter(|f| !f.is_empty());

    let mut cuts: Vec<Cut> = sidecars
        .iter()
        .filter(|sidecar| !sidecar.is_audio())
        .filter(|sidecar| filter.map_or(true, |f| f.contains(&sidecar.clip_stem())))
        .flat_map(|sidecar| {
            sidecar
                .segments
                .iter()
                .filter(|segment| segment.is_usable())
                .map(|segment| Cut {
                    track: KEY_MOMENTS_TRACK,
                    source_file: sidecar.file_path.clone(),
                    start_sec: segment.start_sec,
                    end_sec: segment.end_sec,
                })
        })
        .collect();

    cuts.sort_by(|a, b| {
        a.source_file
            .cmp(&b.source_file)
            .then(a.start_sec.total_cmp(&b.start_sec))
    });

    EditPlan {
        timeline_name: timeline_name.to_string(),
        cuts,
    }
}

/// Parse `"A001, A002"` into a stem set; `None` when nothing is left
pub fn parse_clip_filter(raw: &str) -> Option<HashSet<String>> {
    let stems: HashSet<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    (!stems.is_empty()).then_some(stems)
}
