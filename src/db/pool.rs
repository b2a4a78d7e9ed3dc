use sqlx::postgres::PgPool;

/// Round-trip a trivial query; used at startup and by `GET /health`.
pub async fn health_check(pool: &PgPool) -> Result<bool, sqlx::Error> {
    let one: i32 = sqlx::query_scalar("SELECT 1").fetch_one(pool).await?;
    Ok(one == 1)
}
