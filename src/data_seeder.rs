// Demo data for local development, gated by SEED_DEMO_DATA. Idempotent:
// existing usernames/slugs are left alone on re-run.

use anyhow::Result;

use crate::store::BlogStore;

pub async fn seed(store: &BlogStore) -> Result<()> {
    let sarah = match store.get_user_by_username("sarah").await? {
        Some(user) => user,
        None => {
            store
                .create_user("sarah", "connor.s@skynet.com", "!demo")
                .await?
        }
    };

    let volkov = match store.get_user_by_username("volkov").await? {
        Some(user) => user,
        None => store.create_user("volkov", "volkov@skynet.com", "!demo").await?,
    };

    let group = match store.get_group_by_slug("general").await? {
        Some(group) => group,
        None => {
            store
                .create_group("General", "general", "Everything else")
                .await?
        }
    };

    // Posts only on first run, keyed off sarah having none yet.
    let existing = store
        .count_posts(&crate::store::PostFilter::Author(sarah.id))
        .await?;
    if existing == 0 {
        store
            .create_post(sarah.id, "Hello from the demo seeder", Some(group.id), None)
            .await?;
        store
            .create_post(volkov.id, "Second demo post", None, None)
            .await?;
        tracing::info!("seeded demo users, group and posts");
    }

    Ok(())
}
