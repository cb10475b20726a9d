//! Stage: a single stateless transformation applied to one document.

use async_trait::async_trait;
use conveyor_core::Document;

use crate::error::StageError;

/// A stage transforms one input document and may emit additional documents
/// (children or replacements). Returning `Ok(None)` means "keep the input
/// document as the sole output and continue" — no additional documents.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Human-readable name, used in logs and error messages.
    fn name(&self) -> &str;

    /// Called once before the first document flows through. Stages that pool
    /// a resource (HTTP client, compiled regex, dictionary) acquire it here.
    async fn start(&self) -> Result<(), StageError> {
        Ok(())
    }

    /// Transform `doc` in place, optionally returning additional documents
    /// produced alongside it (e.g. children fanned out from this stage).
    async fn process_document(&self, doc: &mut Document) -> Result<Option<Vec<Document>>, StageError>;

    /// Called once on shutdown. Stages that hold a pooled resource release it here.
    async fn close(&self) -> Result<(), StageError> {
        Ok(())
    }
}

/// A predicate over a document's fields, used by [`ConditionalStage`] to skip
/// a wrapped stage without interrupting the flow of the document itself.
pub trait Predicate: Send + Sync {
    fn matches(&self, doc: &Document) -> bool;
}

/// Predicate requiring a field to hold a specific string value.
pub struct FieldEquals {
    pub field: String,
    pub value: String,
}

impl Predicate for FieldEquals {
    fn matches(&self, doc: &Document) -> bool {
        doc.get_strings(&self.field).iter().any(|v| v == &self.value)
    }
}

/// Decorator that skips the wrapped stage when its predicate is false. The
/// document still flows — only the wrapped stage's side effects are skipped.
pub struct ConditionalStage {
    inner: Box<dyn Stage>,
    predicate: Box<dyn Predicate>,
}

impl ConditionalStage {
    pub fn new(inner: Box<dyn Stage>, predicate: Box<dyn Predicate>) -> Self {
        Self { inner, predicate }
    }
}

#[async_trait]
impl Stage for ConditionalStage {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn start(&self) -> Result<(), StageError> {
        self.inner.start().await
    }

    async fn process_document(&self, doc: &mut Document) -> Result<Option<Vec<Document>>, StageError> {
        if self.predicate.matches(doc) {
            self.inner.process_document(doc).await
        } else {
            Ok(None)
        }
    }

    async fn close(&self) -> Result<(), StageError> {
        self.inner.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct UppercaseTitle;

    #[async_trait]
    impl Stage for UppercaseTitle {
        fn name(&self) -> &str {
            "uppercase-title"
        }

        async fn process_document(&self, doc: &mut Document) -> Result<Option<Vec<Document>>, StageError> {
            if let Some(title) = doc.get_string("title").map(str::to_string) {
                doc.set("title", title.to_uppercase());
            }
            Ok(None)
        }
    }

    #[tokio::test]
    async fn conditional_stage_skips_when_predicate_false() {
        let stage = ConditionalStage::new(
            Box::new(UppercaseTitle),
            Box::new(FieldEquals {
                field: "kind".into(),
                value: "article".into(),
            }),
        );
        let mut doc = Document::create("d1");
        doc.set("kind", "note");
        doc.set("title", "hello");
        stage.process_document(&mut doc).await.unwrap();
        assert_eq!(doc.get_string("title"), Some("hello"));
    }

    #[tokio::test]
    async fn conditional_stage_runs_when_predicate_true() {
        let stage = ConditionalStage::new(
            Box::new(UppercaseTitle),
            Box::new(FieldEquals {
                field: "kind".into(),
                value: "article".into(),
            }),
        );
        let mut doc = Document::create("d1");
        doc.set("kind", "article");
        doc.set("title", "hello");
        stage.process_document(&mut doc).await.unwrap();
        assert_eq!(doc.get_string("title"), Some("HELLO"));
    }
}
