//! Voice bank and speaker-to-voice assignment.
//!
//! Each distinct speaker label gets a stable synthetic voice for the
//! duration of a session, drawn round-robin from the configured
//! accent/gender bank.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Accent {
    American,
    British,
    Australian,
    Indian,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gender {
    Male,
    Female,
}

impl fmt::Display for Accent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Accent::American => "american",
            Accent::British => "british",
            Accent::Australian => "australian",
            Accent::Indian => "indian",
        };
        f.write_str(s)
    }
}

impl FromStr for Accent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "american" => Ok(Accent::American),
            "british" => Ok(Accent::British),
            "australian" => Ok(Accent::Australian),
            "indian" => Ok(Accent::Indian),
            other => Err(format!("unknown accent: {}", other)),
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Gender::Male => "male",
            Gender::Female => "female",
        })
    }
}

impl FromStr for Gender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            other => Err(format!("unknown gender: {}", other)),
        }
    }
}

/// Five voices per accent/gender pair; assignment cycles through them.
pub fn voice_bank(accent: Accent, gender: Gender) -> &'static [&'static str] {
    match (accent, gender) {
        (Accent::American, Gender::Male) => &[
            "en-US-GuyNeural",
            "en-US-BrianNeural",
            "en-US-JasonNeural",
            "en-US-BrandonNeural",
            "en-US-ChristopherNeural",
        ],
        (Accent::American, Gender::Female) => &[
            "en-US-JennyNeural",
            "en-US-AriaNeural",
            "en-US-AvaNeural",
            "en-US-JaneNeural",
            "en-US-CoraNeural",
        ],
        (Accent::British, Gender::Male) => &[
            "en-GB-RyanNeural",
            "en-GB-AlfieNeural",
            "en-GB-ElliotNeural",
            "en-GB-EthanNeural",
            "en-GB-OliverNeural",
        ],
        (Accent::British, Gender::Female) => &[
            "en-GB-AbbiNeural",
            "en-GB-BellaNeural",
            "en-GB-HollieNeural",
            "en-GB-LibbyNeural",
            "en-GB-SoniaNeural",
        ],
        (Accent::Australian, Gender::Male) => &[
            "en-AU-WilliamNeural",
            "en-AU-DuncanNeural",
            "en-AU-TimNeural",
            "en-AU-KenNeural",
            "en-AU-DarrenNeural",
        ],
        (Accent::Australian, Gender::Female) => &[
            "en-AU-TinaNeural",
            "en-AU-NatashaNeural",
            "en-AU-AnnetteNeural",
            "en-AU-FreyaNeural",
            "en-AU-JoanneNeural",
        ],
        (Accent::Indian, Gender::Male) => &[
            "en-IN-PrabhatNeural",
            "en-IN-ArjunNeural",
            "en-IN-AaravNeural",
            "en-IN-KunalNeural",
            "en-IN-RehaanNeural",
        ],
        (Accent::Indian, Gender::Female) => &[
            "en-IN-NeerjaNeural",
            "en-IN-AnanyaNeural",
            "en-IN-AartiNeural",
            "en-IN-AashiNeural",
            "en-IN-KavyaNeural",
        ],
    }
}

/// Lazy, stable speaker-to-voice mapping for one session.
///
/// Assignment is a pure function of (label, assignment order) for a given
/// selection: asking twice for the same label before a reset returns the
/// same voice. No accent selected means no voice, and the caller skips
/// synthesis while the transcript continues.
pub struct VoiceAssignmentTable {
    selection: Option<(Accent, Gender)>,
    assignments: HashMap<String, String>,
    next_index: usize,
}

impl VoiceAssignmentTable {
    pub fn new(selection: Option<(Accent, Gender)>) -> Self {
        Self {
            selection,
            assignments: HashMap::new(),
            next_index: 0,
        }
    }

    pub fn assign(&mut self, speaker: &str) -> Option<String> {
        let (accent, gender) = self.selection?;
        if let Some(existing) = self.assignments.get(speaker) {
            return Some(existing.clone());
        }

        let bank = voice_bank(accent, gender);
        let voice = bank[self.next_index % bank.len()];
        self.assignments.insert(speaker.to_string(), voice.to_string());
        self.next_index += 1;
        tracing::info!(target: "tts", "Assigned voice {} to {}", voice, speaker);
        Some(voice.to_string())
    }

    /// Clears all assignments and restarts the round-robin counter.
    /// Voice identity is only meaningful within one session/selection.
    pub fn reset(&mut self) {
        self.assignments.clear();
        self.next_index = 0;
    }

    pub fn set_selection(&mut self, selection: Option<(Accent, Gender)>) {
        if self.selection != selection {
            self.selection = selection;
            self.reset();
        }
    }

    pub fn assignments(&self) -> &HashMap<String, String> {
        &self.assignments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignment_is_stable_per_speaker() {
        let mut table = VoiceAssignmentTable::new(Some((Accent::British, Gender::Female)));
        let v1 = table.assign("S1").unwrap();
        let v2 = table.assign("S1").unwrap();
        let v3 = table.assign("S1").unwrap();
        assert_eq!(v1, v2);
        assert_eq!(v2, v3);
    }

    #[test]
    fn distinct_speakers_get_distinct_voices() {
        let mut table = VoiceAssignmentTable::new(Some((Accent::American, Gender::Male)));
        let a = table.assign("S1").unwrap();
        let b = table.assign("S2").unwrap();
        assert_ne!(a, b);
        // Order of first appearance decides the draw
        assert_eq!(a, "en-US-GuyNeural");
        assert_eq!(b, "en-US-BrianNeural");
    }

    #[test]
    fn round_robin_wraps_past_bank_size() {
        let mut table = VoiceAssignmentTable::new(Some((Accent::Indian, Gender::Female)));
        let bank = voice_bank(Accent::Indian, Gender::Female);
        for i in 0..bank.len() {
            assert_eq!(table.assign(&format!("S{}", i)).unwrap(), bank[i]);
        }
        // Sixth speaker cycles back to the first voice
        assert_eq!(table.assign("S5").unwrap(), bank[0]);
    }

    #[test]
    fn reset_restarts_counter() {
        let mut table = VoiceAssignmentTable::new(Some((Accent::Australian, Gender::Male)));
        table.assign("S1");
        table.assign("S2");
        table.reset();
        let v = table.assign("S9").unwrap();
        assert_eq!(v, voice_bank(Accent::Australian, Gender::Male)[0]);
    }

    #[test]
    fn no_selection_yields_no_voice() {
        let mut table = VoiceAssignmentTable::new(None);
        assert!(table.assign("S1").is_none());
    }

    #[test]
    fn selection_change_resets_assignments() {
        let mut table = VoiceAssignmentTable::new(Some((Accent::American, Gender::Female)));
        table.assign("S1");
        table.set_selection(Some((Accent::British, Gender::Female)));
        assert!(table.assignments().is_empty());
        assert_eq!(
            table.assign("S1").unwrap(),
            voice_bank(Accent::British, Gender::Female)[0]
        );
    }
}
