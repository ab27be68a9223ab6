mod common;

use circlepoll::engine::TemplateQuery;
use circlepoll::engine::templates::DEFAULT_TEMPLATES;
use circlepoll::error::PollError;
use common::Fixture;
use uuid::Uuid;

#[tokio::test]
async fn list_filters_by_category_and_paginates() {
    let fx = Fixture::new(0).await;
    fx.engine.templates.seed("deep", "Who would you trust with a secret?", None).await.unwrap();
    fx.engine.templates.seed("deep", "Who is the most patient?", None).await.unwrap();

    let (items, total) = fx
        .engine
        .templates
        .list(&TemplateQuery {
            category: Some("deep".to_string()),
            limit: Some(1),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(total, 2);
    assert_eq!(items.len(), 1);

    let (rest, _) = fx
        .engine
        .templates
        .list(&TemplateQuery {
            category: Some("deep".to_string()),
            limit: Some(1),
            offset: Some(1),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(rest.len(), 1);
    assert_ne!(rest[0].id, items[0].id);
}

#[tokio::test]
async fn popular_means_usage_above_threshold() {
    let fx = Fixture::new(0).await;
    for _ in 0..11 {
        fx.engine.templates.increment_usage(fx.template.id).await.unwrap();
    }
    fx.engine.templates.seed("fun", "Who tells the worst jokes?", None).await.unwrap();

    let (items, total) = fx
        .engine
        .templates
        .list(&TemplateQuery {
            popular: true,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(items[0].id, fx.template.id);
    assert_eq!(items[0].usage_count, 11);
}

#[tokio::test]
async fn duplicate_active_text_is_rejected() {
    let fx = Fixture::new(0).await;
    let err = fx
        .engine
        .templates
        .seed("other", &fx.template.text, None)
        .await
        .unwrap_err();
    assert!(matches!(err, PollError::InvalidRequest(_)));
}

#[tokio::test]
async fn deactivated_templates_disappear_from_reads() {
    let fx = Fixture::new(0).await;
    fx.engine.templates.deactivate(fx.template.id).await.unwrap();

    assert!(matches!(
        fx.engine.templates.get(fx.template.id).await.unwrap_err(),
        PollError::TemplateNotFound
    ));
    let (_, total) = fx.engine.templates.list(&TemplateQuery::default()).await.unwrap();
    assert_eq!(total, 0);
    assert!(matches!(
        fx.engine.templates.deactivate(fx.template.id).await.unwrap_err(),
        PollError::TemplateNotFound
    ));
    assert!(matches!(
        fx.engine.templates.get(Uuid::new_v4()).await.unwrap_err(),
        PollError::TemplateNotFound
    ));
}

#[tokio::test]
async fn defaults_are_seeded_only_into_an_empty_registry() {
    let fx = Fixture::new(0).await;
    assert_eq!(fx.engine.templates.seed_defaults().await.unwrap(), 0);

    fx.engine.templates.deactivate(fx.template.id).await.unwrap();
    let seeded = fx.engine.templates.seed_defaults().await.unwrap();
    assert_eq!(seeded, DEFAULT_TEMPLATES.len());

    let (_, total) = fx.engine.templates.list(&TemplateQuery::default()).await.unwrap();
    assert_eq!(total, DEFAULT_TEMPLATES.len() as i64);
}
