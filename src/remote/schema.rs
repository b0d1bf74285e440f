//! Prompts and response schemas, one profile per media kind.

use crate::file_manager::MediaKind;
use serde_json::{json, Value};

const VIDEO_PROMPT: &str = "\
You are an assistant editor logging raw camera footage for a professional edit.
Watch the entire clip and describe it precisely.

Return JSON matching the schema:
- summary: one or two sentences describing the clip as a whole.
- shot_type, camera_movement, setting, lighting: short descriptive values.
- subjects: the people or objects the clip is about.
- audio_description: what can be heard (dialogue, ambience, music, silence).
- segments: every distinct usable moment, in order, with start_sec and end_sec
  in seconds from the start of the clip, a description, and a quality score
  from 1 (unusable) to 5 (hero shot). Exclude camera shake, focus hunts and
  accidental recording at the head or tail of the clip.
- fps and duration: your best estimate.";

const AUDIO_PROMPT: &str = "\
You are an assistant editor logging audio recordings for a professional edit.
Listen to the entire file and describe it precisely.

Return JSON matching the schema:
- summary: one or two sentences describing the recording.
- audio_type: one of dialogue, music, ambience, sfx, mixed.
- transcript: verbatim transcript of any speech, empty if none.
- mood: the emotional tone.
- segments: every distinct usable section, in order, with start_sec and end_sec
  in seconds and a description.
- duration: your best estimate in seconds.";

/// Prompt, schema and resolution hint for one media kind
#[derive(Debug, Clone)]
pub struct AnalysisProfile {
    pub prompt: &'static str,
    pub response_schema: Value,
    pub high_resolution: bool,
}

impl AnalysisProfile {
    pub fn for_kind(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Video => Self {
                prompt: VIDEO_PROMPT,
                response_schema: video_schema(),
                high_resolution: true,
            },
            MediaKind::Audio => Self {
                prompt: AUDIO_PROMPT,
                response_schema: audio_schema(),
                high_resolution: false,
            },
        }
    }

    pub fn request(&self) -> super::AnalysisRequest<'_> {
        super::AnalysisRequest {
            prompt: self.prompt,
            response_schema: &self.response_schema,
            high_resolution: self.high_resolution,
        }
    }
}

fn video_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "summary": { "type": "STRING" },
            "shot_type": { "type": "STRING" },
            "camera_movement": { "type": "STRING" },
            "setting": { "type": "STRING" },
            "lighting": { "type": "STRING" },
            "subjects": { "type": "ARRAY", "items": { "type": "STRING" } },
            "audio_description": { "type": "STRING" },
            "fps": { "type": "NUMBER" },
            "duration": { "type": "NUMBER" },
            "segments": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "start_sec": { "type": "NUMBER" },
                        "end_sec": { "type": "NUMBER" },
                        "description": { "type": "STRING" },
                        "quality": { "type": "INTEGER" }
                    },
                    "required": ["start_sec", "end_sec", "description"]
                }
            }
        },
        "required": ["summary", "segments"]
    })
}

fn audio_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "summary": { "type": "STRING" },
            "audio_type": {
                "type": "STRING",
                "enum": ["dialogue", "music", "ambience", "sfx", "mixed"]
            },
            "transcript": { "type": "STRING" },
            "mood": { "type": "STRING" },
            "duration": { "type": "NUMBER" },
            "segments": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "start_sec": { "type": "NUMBER" },
                        "end_sec": { "type": "NUMBER" },
                        "description": { "type": "STRING" }
                    },
                    "required": ["start_sec", "end_sec", "description"]
                }
            }
        },
        "required": ["summary", "audio_type", "segments"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profiles_differ_by_kind() {
        let video = AnalysisProfile::for_kind(MediaKind::Video);
        let audio = AnalysisProfile::for_kind(MediaKind::Audio);

        assert_ne!(video.prompt, audio.prompt);
        assert!(video.high_resolution);
        assert!(!audio.high_resolution);
        assert!(video.response_schema["properties"].get("shot_type").is_some());
        assert!(audio.response_schema["properties"].get("transcript").is_some());
        for profile in [&video, &audio] {
            let segment = &profile.response_schema["properties"]["segments"]["items"]["properties"];
            assert!(segment.get("start_sec").is_some());
            assert!(segment.get("end_sec").is_some());
        }
    }
}
