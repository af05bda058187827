use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use sap_core::config::StoresConfig;
use sap_core::error::{Error, Result};
use sap_core::traits::{ChatCompleter, ImageEmbedder, TextEmbedder};
use sap_core::types::{ChatMessage, ChatRole, IndexRecord, Modality, Query, QueryImage, RouteMode};
use sap_hybrid::{AnswerComposer, EvidenceContext, QueryRouter, RouterSettings, DEFAULT_QUESTION, NO_CONTEXT};
use sap_providers::{FakeEmbedder, ProviderSet};
use sap_vector::{write_store, FlatIndex, Metric, SharedRetriever};

#[derive(Default)]
struct RecordingChat {
    seen: Mutex<Vec<ChatMessage>>,
    fail: bool,
}

#[async_trait]
impl ChatCompleter for RecordingChat {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        if self.fail {
            return Err(Error::ProviderUnavailable("chat endpoint unreachable".to_string()));
        }
        self.seen.lock().expect("lock").extend_from_slice(messages);
        Ok("That looks like Himalayan nettle.".to_string())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

const TEXT_DIM: usize = 16;
const IMAGE_DIM: usize = 8;

fn plant(id: &str, plant_id: &str, name: &str, text: &str) -> IndexRecord {
    IndexRecord {
        id: Some(id.to_string()),
        plant_id: Some(plant_id.to_string()),
        plant_name: Some(name.to_string()),
        text: Some(text.to_string()),
        ..Default::default()
    }
}

/// Stores built on disk with the fake embedder, so fake queries hit them.
async fn write_fixture(base: &std::path::Path) -> Result<StoresConfig> {
    let stores = StoresConfig { base_dir: base.to_string_lossy().to_string(), ..StoresConfig::default() };
    let text_embedder = FakeEmbedder::new(TEXT_DIM);
    let image_embedder = FakeEmbedder::new(IMAGE_DIM);

    let texts = [
        plant("t0", "sisnu", "Sisnu", "Sisnu leaves are cooked as a soup"),
        plant("t1", "sisnu", "Sisnu", "Sisnu stings when touched"),
        plant("t2", "timur", "Timur", "Timur pepper numbs the tongue"),
    ];
    let mut text_vectors = Vec::new();
    for record in &texts {
        text_vectors.push(text_embedder.embed_text(record.display_text()).await?);
    }
    let flat = FlatIndex::from_vectors(TEXT_DIM, Metric::InnerProduct, &text_vectors).expect("text flat");
    write_store(&stores.dir_for(Modality::Text), &flat, &texts).expect("text store");

    let captions = [plant("c0", "sisnu", "Sisnu", "a plant with stinging hairs")];
    let caption_vectors = vec![text_embedder.embed_text("a plant with stinging hairs").await?];
    let flat = FlatIndex::from_vectors(TEXT_DIM, Metric::InnerProduct, &caption_vectors).expect("caption flat");
    write_store(&stores.dir_for(Modality::Caption), &flat, &captions).expect("caption store");

    let images = [IndexRecord {
        image_path: Some("images/sisnu/1.jpg".to_string()),
        plant_id: Some("sisnu".to_string()),
        ..Default::default()
    }];
    let image_vectors = vec![image_embedder.embed_image(&QueryImage::new(b"sisnu-photo".to_vec())).await?];
    let flat = FlatIndex::from_vectors(IMAGE_DIM, Metric::InnerProduct, &image_vectors).expect("image flat");
    write_store(&stores.dir_for(Modality::Image), &flat, &images).expect("image store");
    Ok(stores)
}

#[tokio::test]
async fn image_question_flows_from_disk_to_answer() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let stores = write_fixture(tmp.path()).await?;
    let retriever = Arc::new(SharedRetriever::open(stores)?);
    let router = QueryRouter::new(retriever, ProviderSet::fake(TEXT_DIM, IMAGE_DIM), RouterSettings::default());

    let query = Query::image(QueryImage::new(b"sisnu-photo".to_vec()));
    let outcome = router.handle_query(&query).await?;
    assert_eq!(outcome.mode, RouteMode::ImageOnly);
    assert_eq!(outcome.fused_ranked.len(), 2);

    let chat = Arc::new(RecordingChat::default());
    let composer = AnswerComposer::new(chat.clone(), 3);
    let answer = composer.answer(&query, &outcome).await?;
    assert_eq!(answer.answer, "That looks like Himalayan nettle.");
    assert_eq!(answer.retrieved.len(), 2);
    assert_eq!(answer.caption, outcome.generated_caption);

    let seen = chat.seen.lock().expect("lock");
    let roles: Vec<_> = seen.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![ChatRole::System, ChatRole::Assistant, ChatRole::User]);
    assert_eq!(seen[2].content, DEFAULT_QUESTION);
    assert!(seen[1].content.contains("Plant candidate: Sisnu"));
    assert!(seen[1].content.contains("Identified plant candidate: Sisnu\nPlant details: Sisnu leaves are cooked as a soup"));
    assert!(seen[1].content.contains("[2] (plant_metadata) Sisnu stings when touched"));
    Ok(())
}

#[tokio::test]
async fn text_question_is_the_user_turn() {
    let outcome = sap_core::types::RouteOutcome {
        mode: RouteMode::TextOnly,
        generated_caption: None,
        fused_ranked: Vec::new(),
        identified_plant: None,
    };
    let query = Query::text("  what is timur used for?  ");
    let messages = AnswerComposer::messages(&query, &EvidenceContext::build(&outcome, 3));
    assert_eq!(messages[2].content, "what is timur used for?");
    assert!(messages[1].content.contains("Image understanding: No image"));
    assert!(messages[1].content.contains("Plant candidate: None"));
    assert!(messages[1].content.contains(NO_CONTEXT));
}

#[tokio::test]
async fn chat_failure_propagates() {
    let outcome = sap_core::types::RouteOutcome {
        mode: RouteMode::TextOnly,
        generated_caption: None,
        fused_ranked: Vec::new(),
        identified_plant: None,
    };
    let composer = AnswerComposer::new(Arc::new(RecordingChat { fail: true, ..Default::default() }), 3);
    let err = composer.answer(&Query::text("hi"), &outcome).await.expect_err("chat down");
    assert!(matches!(err, Error::ProviderUnavailable(_)));
}
