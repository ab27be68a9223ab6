use crate::db::connection::DbPool;
use crate::db::models::{Template, TemplateFilter};
use sqlx::{Error, Postgres, QueryBuilder};
use uuid::Uuid;

const TEMPLATE_COLUMNS: &str = "id, category, text, emoji, usage_count, is_active, created_at";

fn push_template_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &TemplateFilter) {
    builder.push(" WHERE is_active = TRUE");
    if let Some(category) = &filter.category {
        builder.push(" AND category = ").push_bind(category.clone());
    }
    if let Some(min_usage) = filter.min_usage_exclusive {
        builder.push(" AND usage_count > ").push_bind(min_usage);
    }
}

pub async fn list_templates(
    pool: &DbPool,
    filter: &TemplateFilter,
) -> Result<(Vec<Template>, i64), Error> {
    let mut count_query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM templates");
    push_template_filters(&mut count_query, filter);
    let total: i64 = count_query.build_query_scalar().fetch_one(pool).await?;

    let mut query = QueryBuilder::<Postgres>::new(format!("SELECT {TEMPLATE_COLUMNS} FROM templates"));
    push_template_filters(&mut query, filter);
    query
        .push(" ORDER BY usage_count DESC, created_at ASC, id ASC LIMIT ")
        .push_bind(filter.limit)
        .push(" OFFSET ")
        .push_bind(filter.offset);

    let items = query.build_query_as::<Template>().fetch_all(pool).await?;

    Ok((items, total))
}

pub async fn get_template(pool: &DbPool, template_id: Uuid) -> Result<Option<Template>, Error> {
    sqlx::query_as::<_, Template>(&format!(
        "SELECT {TEMPLATE_COLUMNS} FROM templates WHERE id = $1"
    ))
    .bind(template_id)
    .fetch_optional(pool)
    .await
}

pub async fn insert_template(pool: &DbPool, template: &Template) -> Result<(), Error> {
    sqlx::query(
        "INSERT INTO templates (id, category, text, emoji, usage_count, is_active, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(template.id)
    .bind(&template.category)
    .bind(&template.text)
    .bind(&template.emoji)
    .bind(template.usage_count)
    .bind(template.is_active)
    .bind(template.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn deactivate_template(pool: &DbPool, template_id: Uuid) -> Result<bool, Error> {
    let result = sqlx::query("UPDATE templates SET is_active = FALSE WHERE id = $1 AND is_active")
        .bind(template_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn increment_template_usage<'e, E>(executor: E, template_id: Uuid) -> Result<(), Error>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    sqlx::query("UPDATE templates SET usage_count = usage_count + 1 WHERE id = $1")
        .bind(template_id)
        .execute(executor)
        .await?;

    Ok(())
}
