//! Shared application state, built once at startup and handed to every entry point.

use anyhow::Result;
use std::sync::Arc;

use crate::chat::ChatPipeline;
use crate::config::AlterConfig;
use crate::model::{self, ChatOptions, ModelProvider};
use crate::notify::{self, Notifier};
use crate::profile::{self, Profile, ProfileStore};
use crate::retrieval::RetrievalAugmenter;
use crate::scheduler::{Clock, SystemClock};
use crate::user::UserProfile;

#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<AlterConfig>,
    pub user: UserProfile,
    pub model: Arc<dyn ModelProvider>,
    pub options: ChatOptions,
    pub profile: Profile,
    pub retrieval: Option<Arc<RetrievalAugmenter>>,
    pub chat: Arc<ChatPipeline>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
}

impl AppContext {
    /// Open the profile store, create the model client and notifier, and build
    /// the document index.
    pub async fn build(config: AlterConfig, user: UserProfile) -> Result<Self> {
        let store = profile::create_store(&config, &user.name)?;
        tracing::info!(backend = store.backend(), user = %user.name, "profile store ready");

        let model: Arc<dyn ModelProvider> = Arc::from(model::create_provider(&config.model)?);
        tracing::info!(model = model.model_name(), "model provider ready");

        let notifier = notify::create_notifier(&config.notify);

        let ctx = Self::from_parts(config, user, model, store, notifier, Arc::new(SystemClock));
        if let Some(rag) = &ctx.retrieval {
            // a broken docs dir only disables retrieval
            if let Err(e) = rag.build().await {
                tracing::warn!(error = %e, "document index build failed");
            }
        }
        Ok(ctx)
    }

    /// Wire already-constructed collaborators together. The index is not built.
    pub fn from_parts(
        config: AlterConfig,
        user: UserProfile,
        model: Arc<dyn ModelProvider>,
        store: Arc<dyn ProfileStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let options = ChatOptions::from(&config.model);
        let profile = Profile::new(store);

        let retrieval = config.retrieval.enabled.then(|| {
            Arc::new(RetrievalAugmenter::new(
                &config.retrieval,
                config.resolved_docs_dir(),
                Arc::clone(&model),
                options,
            ))
        });

        let chat = Arc::new(ChatPipeline::new(
            Arc::clone(&model),
            options,
            profile.clone(),
            retrieval.clone(),
            user.clone(),
            config.chat.clone(),
        ));

        Self {
            config: Arc::new(config),
            user,
            model,
            options,
            profile,
            retrieval,
            chat,
            notifier,
            clock,
        }
    }
}
