pub mod adapter;
pub mod http;
pub mod sentences;

pub use adapter::ClassifierAdapter;
pub use http::HttpInferenceClient;
pub use sentences::split_sentences;
