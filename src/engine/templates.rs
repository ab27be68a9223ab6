use crate::clock::Clock;
use crate::db::models::{Template, TemplateFilter};
use crate::db::store::PollStore;
use crate::error::{PollError, PollResult, StoreError};
use std::sync::Arc;
use uuid::Uuid;

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Seed set for fresh deployments: (category, text, emoji).
pub const DEFAULT_TEMPLATES: &[(&str, &str, &str)] = &[
    ("personality", "Who is most likely to become famous?", "🌟"),
    ("personality", "Who gives the best advice?", "🦉"),
    ("fun", "Who would survive longest in a zombie apocalypse?", "🧟"),
    ("fun", "Who has the best laugh?", "😂"),
    ("friendship", "Who would you call at 3am?", "📞"),
    ("friendship", "Who always remembers birthdays?", "🎂"),
];

#[derive(Debug, Clone, Default)]
pub struct TemplateQuery {
    pub category: Option<String>,
    pub popular: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Clone)]
pub struct TemplateRegistry {
    store: Arc<dyn PollStore>,
    clock: Arc<dyn Clock>,
    popular_threshold: i64,
}

impl TemplateRegistry {
    pub fn new(store: Arc<dyn PollStore>, clock: Arc<dyn Clock>, popular_threshold: i64) -> Self {
        Self {
            store,
            clock,
            popular_threshold,
        }
    }

    pub async fn list(&self, query: &TemplateQuery) -> PollResult<(Vec<Template>, i64)> {
        let filter = TemplateFilter {
            category: query.category.clone(),
            min_usage_exclusive: query.popular.then_some(self.popular_threshold),
            limit: query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
            offset: query.offset.unwrap_or(0).max(0),
        };
        Ok(self.store.list_templates(&filter).await?)
    }

    /// Deactivated templates are not found.
    pub async fn get(&self, template_id: Uuid) -> PollResult<Template> {
        self.store
            .get_template(template_id)
            .await?
            .filter(|t| t.is_active)
            .ok_or(PollError::TemplateNotFound)
    }

    pub async fn increment_usage(&self, template_id: Uuid) -> PollResult<()> {
        Ok(self.store.increment_template_usage(template_id).await?)
    }

    pub async fn seed(&self, category: &str, text: &str, emoji: Option<&str>) -> PollResult<Template> {
        let text = text.trim();
        if text.is_empty() || category.trim().is_empty() {
            return Err(PollError::InvalidRequest(
                "template category and text are required".to_string(),
            ));
        }

        let template = Template {
            id: Uuid::new_v4(),
            category: category.trim().to_string(),
            text: text.to_string(),
            emoji: emoji.map(str::to_string),
            usage_count: 0,
            is_active: true,
            created_at: self.clock.now(),
        };

        match self.store.insert_template(&template).await {
            Ok(()) => {
                info!(template_id = %template.id, category = %template.category, "template seeded");
                Ok(template)
            }
            Err(StoreError::Conflict(_)) => Err(PollError::InvalidRequest(format!(
                "an active template already asks \"{text}\""
            ))),
            Err(e) => Err(e.into()),
        }
    }

    /// Seeds `DEFAULT_TEMPLATES` unless the registry already has templates.
    pub async fn seed_defaults(&self) -> PollResult<usize> {
        let (_, total) = self.list(&TemplateQuery::default()).await?;
        if total > 0 {
            return Ok(0);
        }
        for (category, text, emoji) in DEFAULT_TEMPLATES {
            self.seed(category, text, Some(emoji)).await?;
        }
        Ok(DEFAULT_TEMPLATES.len())
    }

    pub async fn deactivate(&self, template_id: Uuid) -> PollResult<()> {
        if self.store.deactivate_template(template_id).await? {
            info!(%template_id, "template deactivated");
            Ok(())
        } else {
            Err(PollError::TemplateNotFound)
        }
    }
}
