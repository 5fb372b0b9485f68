// ABOUTME: Pure composition of per-user preference records into system prompts
// ABOUTME: Deterministic string building with graceful handling of bad stored data
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Prism Labs

//! # Prompt Personalization
//!
//! Builds the final system prompt sent to the model from a base prompt and a
//! user's stored preferences. The composer is a pure function: no I/O, no
//! hidden state, byte-identical output for identical input. Accounts without
//! actionable preferences get the base prompt back unchanged.

use crate::models::{PreferenceRecord, Tone};

/// Tone directive appended for each base tone setting
const fn tone_directive(tone: Tone) -> &'static str {
    match tone {
        Tone::Formal => {
            "Adopt a formal, professional tone. Be precise and avoid colloquialisms."
        }
        Tone::Friendly => {
            "Adopt a friendly, warm tone. Keep the exchange conversational and approachable."
        }
        Tone::Concise => {
            "Be concise and direct. Keep responses brief and avoid unnecessary elaboration."
        }
        Tone::Detailed => {
            "Give detailed, comprehensive answers. Include examples where they aid understanding."
        }
    }
}

/// Build the personalized system prompt for a user
///
/// Returns `base_prompt` unchanged when `preferences` is absent or carries no
/// actionable field. Otherwise appends a "Personalization settings:" section
/// with one directive per populated field. Stored `additional_preferences`
/// that fail to parse as a JSON string array are skipped silently; a corrupt
/// stored value must never break prompt construction.
#[must_use]
pub fn build_personalized_system_prompt(
    base_prompt: &str,
    preferences: Option<&PreferenceRecord>,
) -> String {
    let Some(prefs) = preferences else {
        return base_prompt.to_owned();
    };

    let mut directives: Vec<String> = Vec::new();

    if let Some(tone) = prefs.base_tone {
        directives.push(tone_directive(tone).to_owned());
    }

    if let Some(nickname) = non_empty(prefs.nickname.as_deref()) {
        directives.push(format!("Address the user as \"{nickname}\"."));
    }
    if let Some(occupation) = non_empty(prefs.occupation.as_deref()) {
        directives.push(format!("The user works as: {occupation}."));
    }
    if let Some(interests) = non_empty(prefs.interests.as_deref()) {
        directives.push(format!("The user is interested in: {interests}."));
    }
    if let Some(values) = non_empty(prefs.values.as_deref()) {
        directives.push(format!("The user values: {values}."));
    }
    if let Some(comms) = non_empty(prefs.communication_preferences.as_deref()) {
        directives.push(format!("Communication preferences: {comms}."));
    }

    if let Some(raw) = non_empty(prefs.additional_preferences.as_deref()) {
        // Stored as a JSON string array; anything else is skipped, not fatal.
        if let Ok(entries) = serde_json::from_str::<Vec<String>>(raw) {
            for entry in entries {
                if !entry.trim().is_empty() {
                    directives.push(entry);
                }
            }
        }
    }

    if directives.is_empty() {
        return base_prompt.to_owned();
    }

    let mut prompt = String::with_capacity(base_prompt.len() + 64 * directives.len());
    prompt.push_str(base_prompt);
    prompt.push_str("\n\nPersonalization settings:\n");
    for directive in &directives {
        prompt.push_str("- ");
        prompt.push_str(directive);
        prompt.push('\n');
    }
    prompt
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
