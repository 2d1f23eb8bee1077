// SPDX-FileCopyrightText: 2026 Sift Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Sift retrieval-augmentation engine.
//!
//! This crate provides the shared data model, the error taxonomy, the learned
//! [`SystemParameters`](params::SystemParameters) and the collaborator traits
//! every external dependency (LLM, stores, embedder, generator) implements.

pub mod context;
pub mod error;
pub mod evaluation;
pub mod memory;
pub mod params;
pub mod records;
pub mod traits;
pub mod types;

pub use error::SiftError;
pub use params::{ParameterStore, SystemParameters};
pub use types::{AdapterType, HealthStatus, SessionId};

pub use traits::{
    ActionStore, EmbeddingAdapter, EventStore, GenerationAdapter, GenerationRequest, LlmAdapter,
    PluginAdapter, SessionStore, VectorStore,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sift_error_has_all_variants() {
        let _config = SiftError::Config("test".into());
        let _storage = SiftError::storage(std::io::Error::other("test"));
        let _provider = SiftError::provider("test");
        let _analysis = SiftError::Analysis("test".into());
        let _retrieval = SiftError::Retrieval {
            channel: context::ResultSource::Event,
            message: "test".into(),
        };
        let _evaluation = SiftError::Evaluation("test".into());
        let _generation = SiftError::Generation("test".into());
        let _timeout = SiftError::Timeout {
            duration: std::time::Duration::from_secs(30),
        };
        let _internal = SiftError::Internal("test".into());
    }

    #[test]
    fn retrieval_error_names_channel() {
        let err = SiftError::Retrieval {
            channel: context::ResultSource::Vector,
            message: "index offline".into(),
        };
        assert_eq!(
            err.to_string(),
            "retrieval failed on vector channel: index offline"
        );
    }

    #[test]
    fn adapter_type_round_trips() {
        use std::str::FromStr;

        let variants = [
            AdapterType::Llm,
            AdapterType::Generation,
            AdapterType::Embedding,
            AdapterType::VectorStore,
            AdapterType::EventStore,
            AdapterType::ActionStore,
            AdapterType::SessionStore,
        ];
        for variant in &variants {
            let parsed = AdapterType::from_str(&variant.to_string()).expect("should parse back");
            assert_eq!(*variant, parsed);
        }
    }

    #[test]
    fn all_traits_are_exported() {
        fn _assert_plugin_adapter<T: PluginAdapter>() {}
        fn _assert_llm<T: LlmAdapter>() {}
        fn _assert_generation<T: GenerationAdapter>() {}
        fn _assert_embedding<T: EmbeddingAdapter>() {}
        fn _assert_vector<T: VectorStore>() {}
        fn _assert_event<T: EventStore>() {}
        fn _assert_action<T: ActionStore>() {}
        fn _assert_session<T: SessionStore>() {}
    }
}
