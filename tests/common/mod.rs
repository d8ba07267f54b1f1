//! Shared test utilities

use podium_gateway::Section;
use podium_gateway::audio::SAMPLE_RATE;

/// Build a section with seeded triggers
#[must_use]
pub fn section(id: &str, primary: &str, alternatives: &[&str]) -> Section {
    let mut section = Section {
        id: id.to_string(),
        content: format!("Slide {id}"),
        primary_trigger: primary.to_string(),
        alternative_triggers: alternatives.iter().map(ToString::to_string).collect(),
        selected_triggers: Vec::new(),
        image_url: None,
    };
    section.seed_triggers();
    section
}

/// Generate sine wave audio samples
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn generate_sine_samples(frequency: f32, duration_secs: f32, amplitude: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

/// Generate silence
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn generate_silence(duration_secs: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    vec![0.0; num_samples]
}
