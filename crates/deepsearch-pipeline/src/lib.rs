//! # deepsearch-pipeline
//!
//! The scrape, chunk/embed, retrieve, and synthesis stages, the collaborator
//! clients they call out to, the response cache, and the orchestrator that
//! sequences all of it into one DeepSearch run.
//!
//! ```text
//! ┌──────────┐   ┌───────┐   ┌──────────┐   ┌───────────┐
//! │  Scrape  │──▶│ Chunk │──▶│ Retrieve │──▶│ Synthesis │
//! └──────────┘   └───────┘   └──────────┘   └───────────┘
//!       ▲                                         │
//!       └──────────────────── Orchestrator ───────┘
//! ```

pub mod cache;
pub mod chunk;
pub mod crawler_client;
pub mod orchestrator;
pub mod retrieve;
pub mod scrape;
pub mod synthesis;
pub mod vector_store_client;

pub use cache::{cache_key, ResponseCache};
pub use chunk::{chunk_and_embed, chunk_id, ChunkConfig};
pub use crawler_client::{CrawlRequest, CrawlResponse, CrawlerClient, HttpCrawlerClient};
pub use orchestrator::PipelineOrchestrator;
pub use retrieve::{retrieve_chunks, RetrieveConfig};
pub use scrape::{scrape_results, ScrapeConfig};
pub use synthesis::{build_context, synthesize, synthesize_stream, SynthesisConfig};
pub use vector_store_client::{EmbedDocument, EmbedRequest, HttpVectorStoreClient, InMemoryVectorStore, QueryRequest, QueryResponse, VectorStoreClient};
