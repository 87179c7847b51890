use async_trait::async_trait;
use common::FileIdentity;

/// Source of the current text of real documents.
///
/// `open` may suspend (the host loads the document when nothing is in
/// memory yet); it is the only await point in job materialisation.
#[async_trait(?Send)]
pub trait DocumentHost {
    async fn open(&self, file: &FileIdentity) -> anyhow::Result<String>;
}
