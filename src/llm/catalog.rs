// ABOUTME: Static model catalog mapping public model names to aggregator ids and credit costs
// ABOUTME: Unknown models fall back to a baseline cost so they are chargeable, never free
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Prism Labs

//! Model catalog.
//!
//! Clients pick models by short public name; the catalog resolves the
//! aggregator-side identifier and the integer credit cost of one completed
//! response. The table is static and read-only.

/// Model served when a chat does not specify one
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Credit cost applied to models missing from the catalog
///
/// Unrecognized models still get dispatched (the aggregator decides whether
/// it can serve them) and are charged at this baseline rather than for free.
pub const BASELINE_COST: i64 = 5;

/// One catalog row
struct CatalogEntry {
    /// Public name clients send
    name: &'static str,
    /// Identifier the aggregator expects
    aggregator_id: &'static str,
    /// Credits debited per completed response
    cost: i64,
}

const CATALOG: &[CatalogEntry] = &[
    CatalogEntry {
        name: "gpt-4o-mini",
        aggregator_id: "openai/gpt-4o-mini",
        cost: 1,
    },
    CatalogEntry {
        name: "gpt-4o",
        aggregator_id: "openai/gpt-4o",
        cost: 8,
    },
    CatalogEntry {
        name: "o3-mini",
        aggregator_id: "openai/o3-mini",
        cost: 6,
    },
    CatalogEntry {
        name: "claude-sonnet",
        aggregator_id: "anthropic/claude-sonnet-4",
        cost: 8,
    },
    CatalogEntry {
        name: "claude-haiku",
        aggregator_id: "anthropic/claude-3.5-haiku",
        cost: 2,
    },
    CatalogEntry {
        name: "gemini-flash",
        aggregator_id: "google/gemini-2.0-flash-001",
        cost: 1,
    },
    CatalogEntry {
        name: "gemini-pro",
        aggregator_id: "google/gemini-2.5-pro",
        cost: 6,
    },
    CatalogEntry {
        name: "llama-70b",
        aggregator_id: "meta-llama/llama-3.3-70b-instruct",
        cost: 2,
    },
    CatalogEntry {
        name: "deepseek-chat",
        aggregator_id: "deepseek/deepseek-chat-v3",
        cost: 2,
    },
];

fn lookup(model: &str) -> Option<&'static CatalogEntry> {
    CATALOG.iter().find(|entry| entry.name == model)
}

/// Credit cost for one completed response from `model`
#[must_use]
pub fn completion_cost(model: &str) -> i64 {
    lookup(model).map_or(BASELINE_COST, |entry| entry.cost)
}

/// Resolve the aggregator-side identifier for `model`
///
/// Unknown names pass through unchanged; the aggregator rejects identifiers
/// it cannot serve and that surfaces as an upstream failure.
#[must_use]
pub fn resolve_aggregator_model(model: &str) -> &str {
    lookup(model).map_or(model, |entry| entry.aggregator_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_model_cost() {
        assert_eq!(completion_cost("gpt-4o-mini"), 1);
        assert_eq!(completion_cost("gpt-4o"), 8);
    }

    #[test]
    fn test_unknown_model_chargeable_at_baseline() {
        assert_eq!(completion_cost("experimental-model-x"), BASELINE_COST);
        assert!(completion_cost("experimental-model-x") > 0);
    }

    #[test]
    fn test_aggregator_id_resolution() {
        assert_eq!(resolve_aggregator_model("claude-haiku"), "anthropic/claude-3.5-haiku");
        assert_eq!(resolve_aggregator_model("custom/model"), "custom/model");
    }
}
