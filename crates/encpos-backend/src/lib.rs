//! encpos-backend
//!
//! HTTP clients for the services the search facade depends on: the search
//! backend (`elastic`) and the document-retrieval service plus metadata file
//! (`dts`). `index_conf` prepares index configuration payloads from disk.
pub mod dts;
pub mod elastic;
pub mod index_conf;

pub use dts::DtsClient;
pub use elastic::ElasticClient;
