//! Rows seeded straight into the database, bypassing the upload flow.

use rust_decimal::Decimal;
use uuid::Uuid;

/// A completed, active media record with a single 720p rendition.
pub async fn insert_ready_media(pool: &sqlx::PgPool, owner: Uuid, visibility: &str) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO media (
            id, title, media_type, visibility, uploaded_by, uploader_type,
            s3_key_original, transcoding_status, media_url
        )
        VALUES ($1, $2, 'music', $3::visibility, $4, 'artist', $5, 'completed', $6)
        "#,
    )
    .bind(id)
    .bind(format!("Track {}", &id.simple().to_string()[..6]))
    .bind(visibility)
    .bind(owner)
    .bind(format!("uploads/{}/{}/track.mp3", owner, Uuid::new_v4()))
    .bind(format!("https://media.streamhub.test/transcoded/{}/track.m3u8", id))
    .execute(pool)
    .await
    .expect("Failed to insert media");

    sqlx::query(
        r#"
        INSERT INTO media_variants (id, media_id, resolution, stream_url, bitrate_kbps)
        VALUES ($1, $2, '720p', $3, 3000)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(id)
    .bind(format!(
        "https://media.streamhub.test/transcoded/{}/track_720p.m3u8",
        id
    ))
    .execute(pool)
    .await
    .expect("Failed to insert variant");

    id
}

pub async fn insert_plan(
    pool: &sqlx::PgPool,
    name: &str,
    level: i32,
    price: Decimal,
    stripe_price_id: Option<&str>,
) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO subscription_plans (id, name, plan_level, price, currency, duration_months, stripe_price_id)
        VALUES ($1, $2, $3, $4, 'usd', 1, $5)
        "#,
    )
    .bind(id)
    .bind(name)
    .bind(level)
    .bind(price)
    .bind(stripe_price_id)
    .execute(pool)
    .await
    .expect("Failed to insert plan");
    id
}
