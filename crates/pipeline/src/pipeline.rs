//! Pipeline: an ordered, immutable chain of stages.

use std::future::Future;
use std::pin::Pin;

use conveyor_core::Document;
use tracing::instrument;

use crate::error::StageError;
use crate::stage::Stage;

pub struct Pipeline {
    name: String,
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    pub fn new(name: impl Into<String>, stages: Vec<Box<dyn Stage>>) -> Self {
        Self {
            name: name.into(),
            stages,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Call `start()` on every stage, in order. Aborts on the first failure.
    pub async fn start(&self) -> Result<(), StageError> {
        for stage in &self.stages {
            stage.start().await?;
        }
        Ok(())
    }

    pub async fn close(&self) -> Result<(), StageError> {
        for stage in &self.stages {
            stage.close().await?;
        }
        Ok(())
    }

    /// Run `doc` through the full stage chain. The result is
    /// `[input-after-all-stages, ...all-emitted-descendants]` — a stage never
    /// reprocesses output it produced; descendants only see the stages that
    /// come after the one that emitted them.
    #[instrument(skip_all, fields(pipeline = %self.name, document_id = %doc.id()))]
    pub async fn process(&self, doc: Document) -> Result<Vec<Document>, StageError> {
        self.process_from(doc, 0).await
    }

    // Stage processing is async, so the recursive descent into descendants'
    // remaining stages needs a boxed future rather than plain recursion.
    fn process_from(
        &self,
        mut doc: Document,
        stage_index: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Document>, StageError>> + Send + '_>> {
        Box::pin(async move {
            if stage_index >= self.stages.len() {
                return Ok(vec![doc]);
            }

            let stage = &self.stages[stage_index];
            let emitted = stage.process_document(&mut doc).await?;

            // The primary document continues through the rest of the chain first —
            // its post-chain form is always the first element of the final result.
            let mut primary = self.process_from(doc, stage_index + 1).await?;

            if let Some(descendants) = emitted {
                for descendant in descendants {
                    let descendant_results = self.process_from(descendant, stage_index + 1).await?;
                    primary.extend(descendant_results);
                }
            }

            Ok(primary)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FanOut {
        count: usize,
    }

    #[async_trait]
    impl Stage for FanOut {
        fn name(&self) -> &str {
            "fan-out"
        }

        async fn process_document(&self, doc: &mut Document) -> Result<Option<Vec<Document>>, StageError> {
            let children: Vec<Document> = (0..self.count)
                .map(|i| Document::create(format!("{}-c{i}", doc.id())))
                .collect();
            Ok(Some(children))
        }
    }

    struct TagStage {
        name: &'static str,
    }

    #[async_trait]
    impl Stage for TagStage {
        fn name(&self) -> &str {
            self.name
        }

        async fn process_document(&self, doc: &mut Document) -> Result<Option<Vec<Document>>, StageError> {
            doc.set_or_add("seen", self.name);
            Ok(None)
        }
    }

    struct FailingStage;

    #[async_trait]
    impl Stage for FailingStage {
        fn name(&self) -> &str {
            "failing"
        }

        async fn process_document(&self, doc: &mut Document) -> Result<Option<Vec<Document>>, StageError> {
            Err(StageError::Processing {
                stage: self.name().to_string(),
                document_id: doc.id().to_string(),
                message: "boom".into(),
            })
        }
    }

    #[tokio::test]
    async fn empty_pipeline_passes_through() {
        let pipeline = Pipeline::new("noop", vec![]);
        let results = pipeline.process(Document::create("d1")).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id(), "d1");
    }

    #[tokio::test]
    async fn fan_out_children_skip_earlier_stages() {
        let pipeline = Pipeline::new(
            "fanout-then-tag",
            vec![Box::new(FanOut { count: 2 }), Box::new(TagStage { name: "after-fanout" })],
        );
        let results = pipeline.process(Document::create("d1")).await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].id(), "d1");
        // The parent and both children see the tag stage (it runs after fan-out).
        for doc in &results {
            assert_eq!(doc.get_strings("seen"), vec!["after-fanout"]);
        }
        assert_eq!(results[1].id(), "d1-c0");
        assert_eq!(results[2].id(), "d1-c1");
    }

    #[tokio::test]
    async fn stage_failure_aborts_processing() {
        let pipeline = Pipeline::new("fails", vec![Box::new(FailingStage)]);
        let result = pipeline.process(Document::create("bad")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn stages_run_in_declared_order() {
        let pipeline = Pipeline::new(
            "ordered",
            vec![Box::new(TagStage { name: "first" }), Box::new(TagStage { name: "second" })],
        );
        let results = pipeline.process(Document::create("d1")).await.unwrap();
        assert_eq!(results[0].get_strings("seen"), vec!["first", "second"]);
    }
}
