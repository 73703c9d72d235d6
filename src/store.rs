// Entity Store: async sqlx-backed persistence for users, groups, posts,
// comments and follow edges. Query construction for post feeds is kept as
// pure functions (PostFilter) so filter/order/limit logic stays testable
// without a pool.

use anyhow::Result;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;

use crate::models::{Comment, CommentRecord, Follow, Group, Post, PostRecord, User};

/// Filter over the posts table, composed into WHERE clauses by `where_sql`.
#[derive(Debug, Clone, PartialEq)]
pub enum PostFilter {
    All,
    Group(i64),
    Author(i64),
    /// Posts by any author in the set. An empty set matches nothing.
    Authors(Vec<i64>),
}

impl PostFilter {
    /// WHERE clause (with leading keyword, or empty) plus positional binds,
    /// against a posts table aliased `p`.
    pub fn where_sql(&self) -> (String, Vec<i64>) {
        match self {
            PostFilter::All => (String::new(), Vec::new()),
            PostFilter::Group(group_id) => ("WHERE p.group_id = ?".to_string(), vec![*group_id]),
            PostFilter::Author(author_id) => {
                ("WHERE p.author_id = ?".to_string(), vec![*author_id])
            }
            PostFilter::Authors(author_ids) => {
                if author_ids.is_empty() {
                    // No followed authors: match no rows.
                    return ("WHERE 0".to_string(), Vec::new());
                }
                let placeholders = vec!["?"; author_ids.len()].join(", ");
                (
                    format!("WHERE p.author_id IN ({})", placeholders),
                    author_ids.clone(),
                )
            }
        }
    }
}

// Async store with SQLx connection pool
pub struct BlogStore {
    pub pool: SqlitePool,
}

impl BlogStore {
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;

        Ok(BlogStore { pool })
    }

    pub async fn init(&self) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                email TEXT NOT NULL,
                password_hash TEXT NOT NULL,
                joined INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS groups (
                id INTEGER PRIMARY KEY,
                title TEXT NOT NULL,
                slug TEXT NOT NULL UNIQUE,
                description TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        // Group deletion empties the reference instead of cascading.
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS posts (
                id INTEGER PRIMARY KEY,
                text TEXT NOT NULL,
                image TEXT,
                author_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                group_id INTEGER REFERENCES groups(id) ON DELETE SET NULL,
                pub_date INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS comments (
                id INTEGER PRIMARY KEY,
                post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                author_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                text TEXT NOT NULL,
                created INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS follows (
                id INTEGER PRIMARY KEY,
                follower_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                author_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE
            )",
        )
        .execute(&self.pool)
        .await?;

        // Feed queries order by (pub_date, id) and filter by author/group.
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_posts_pub_date ON posts(pub_date, id)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_posts_author ON posts(author_id, pub_date)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_posts_group ON posts(group_id, pub_date)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id, created)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_follows_follower ON follows(follower_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_follows_author ON follows(author_id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // --- users ---

    pub async fn create_user(&self, username: &str, email: &str, password_hash: &str) -> Result<User> {
        let now = Utc::now().timestamp();

        let result = sqlx::query(
            "INSERT INTO users (username, email, password_hash, joined) VALUES (?, ?, ?, ?)",
        )
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(User {
            id: result.last_insert_rowid(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            joined: now,
        })
    }

    pub async fn get_user(&self, id: i64) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, username, email, password_hash, joined FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| User {
            id: row.get("id"),
            username: row.get("username"),
            email: row.get("email"),
            password_hash: row.get("password_hash"),
            joined: row.get("joined"),
        }))
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query(
            "SELECT id, username, email, password_hash, joined FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| User {
            id: row.get("id"),
            username: row.get("username"),
            email: row.get("email"),
            password_hash: row.get("password_hash"),
            joined: row.get("joined"),
        }))
    }

    // --- groups ---

    pub async fn create_group(&self, title: &str, slug: &str, description: &str) -> Result<Group> {
        let result =
            sqlx::query("INSERT INTO groups (title, slug, description) VALUES (?, ?, ?)")
                .bind(title)
                .bind(slug)
                .bind(description)
                .execute(&self.pool)
                .await?;

        Ok(Group {
            id: result.last_insert_rowid(),
            title: title.to_string(),
            slug: slug.to_string(),
            description: description.to_string(),
        })
    }

    pub async fn get_group(&self, id: i64) -> Result<Option<Group>> {
        let row = sqlx::query("SELECT id, title, slug, description FROM groups WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| Group {
            id: row.get("id"),
            title: row.get("title"),
            slug: row.get("slug"),
            description: row.get("description"),
        }))
    }

    pub async fn get_group_by_slug(&self, slug: &str) -> Result<Option<Group>> {
        let row = sqlx::query("SELECT id, title, slug, description FROM groups WHERE slug = ?")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| Group {
            id: row.get("id"),
            title: row.get("title"),
            slug: row.get("slug"),
            description: row.get("description"),
        }))
    }

    /// Deletes a group; dependent posts keep their rows with an emptied
    /// group reference (ON DELETE SET NULL).
    pub async fn delete_group(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM groups WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // --- posts ---

    pub async fn create_post(
        &self,
        author_id: i64,
        text: &str,
        group_id: Option<i64>,
        image: Option<&str>,
    ) -> Result<Post> {
        let now = Utc::now().timestamp();

        let result = sqlx::query(
            "INSERT INTO posts (text, image, author_id, group_id, pub_date) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(text)
        .bind(image)
        .bind(author_id)
        .bind(group_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(Post {
            id: result.last_insert_rowid(),
            text: text.to_string(),
            image: image.map(|s| s.to_string()),
            author_id,
            group_id,
            pub_date: now,
        })
    }

    pub async fn get_post(&self, id: i64) -> Result<Option<Post>> {
        let row = sqlx::query(
            "SELECT id, text, image, author_id, group_id, pub_date FROM posts WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| Post {
            id: row.get("id"),
            text: row.get("text"),
            image: row.get("image"),
            author_id: row.get("author_id"),
            group_id: row.get("group_id"),
            pub_date: row.get("pub_date"),
        }))
    }

    /// Updates the editable fields. Author and pub_date are immutable and
    /// deliberately not part of this statement.
    pub async fn update_post(
        &self,
        id: i64,
        text: &str,
        group_id: Option<i64>,
        image: Option<&str>,
    ) -> Result<()> {
        sqlx::query("UPDATE posts SET text = ?, group_id = ?, image = ? WHERE id = ?")
            .bind(text)
            .bind(group_id)
            .bind(image)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Deletes a post; its comments cascade.
    pub async fn delete_post(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn count_posts(&self, filter: &PostFilter) -> Result<i64> {
        let (where_clause, binds) = filter.where_sql();
        let sql = format!("SELECT COUNT(*) AS n FROM posts p {}", where_clause);

        let mut query = sqlx::query(&sql);
        for bind in binds {
            query = query.bind(bind);
        }

        let row = query.fetch_one(&self.pool).await?;
        Ok(row.get("n"))
    }

    /// Filtered slice of the post timeline, newest first. Ties on pub_date
    /// break by descending id so the order is total.
    pub async fn list_posts(
        &self,
        filter: &PostFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<PostRecord>> {
        let (where_clause, binds) = filter.where_sql();
        let sql = format!(
            "SELECT p.id, p.text, p.image, p.author_id, u.username AS author_username,
                    p.group_id, g.slug AS group_slug, p.pub_date
             FROM posts p
             JOIN users u ON u.id = p.author_id
             LEFT JOIN groups g ON g.id = p.group_id
             {}
             ORDER BY p.pub_date DESC, p.id DESC
             LIMIT ? OFFSET ?",
            where_clause
        );

        let mut query = sqlx::query(&sql);
        for bind in binds {
            query = query.bind(bind);
        }
        query = query.bind(limit).bind(offset);

        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows
            .into_iter()
            .map(|row| PostRecord {
                id: row.get("id"),
                text: row.get("text"),
                image: row.get("image"),
                author_id: row.get("author_id"),
                author_username: row.get("author_username"),
                group_id: row.get("group_id"),
                group_slug: row.get("group_slug"),
                pub_date: row.get("pub_date"),
            })
            .collect())
    }

    // --- comments ---

    pub async fn create_comment(&self, post_id: i64, author_id: i64, text: &str) -> Result<Comment> {
        let now = Utc::now().timestamp();

        let result =
            sqlx::query("INSERT INTO comments (post_id, author_id, text, created) VALUES (?, ?, ?, ?)")
                .bind(post_id)
                .bind(author_id)
                .bind(text)
                .bind(now)
                .execute(&self.pool)
                .await?;

        Ok(Comment {
            id: result.last_insert_rowid(),
            post_id,
            author_id,
            text: text.to_string(),
            created: now,
        })
    }

    /// Comments for a post, oldest first.
    pub async fn list_comments(&self, post_id: i64) -> Result<Vec<CommentRecord>> {
        let rows = sqlx::query(
            "SELECT c.id, c.post_id, c.author_id, u.username AS author_username, c.text, c.created
             FROM comments c
             JOIN users u ON u.id = c.author_id
             WHERE c.post_id = ?
             ORDER BY c.created ASC, c.id ASC",
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| CommentRecord {
                id: row.get("id"),
                post_id: row.get("post_id"),
                author_id: row.get("author_id"),
                author_username: row.get("author_username"),
                text: row.get("text"),
                created: row.get("created"),
            })
            .collect())
    }

    // --- follow edges ---

    pub async fn create_follow(&self, follower_id: i64, author_id: i64) -> Result<Follow> {
        let result = sqlx::query("INSERT INTO follows (follower_id, author_id) VALUES (?, ?)")
            .bind(follower_id)
            .bind(author_id)
            .execute(&self.pool)
            .await?;

        Ok(Follow {
            id: result.last_insert_rowid(),
            follower_id,
            author_id,
        })
    }

    /// Removes every matching edge. Returns the number removed; zero is not
    /// an error (unfollow is idempotent).
    pub async fn delete_follow(&self, follower_id: i64, author_id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM follows WHERE follower_id = ? AND author_id = ?")
            .bind(follower_id)
            .bind(author_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn is_following(&self, follower_id: i64, author_id: i64) -> Result<bool> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM follows WHERE follower_id = ? AND author_id = ?",
        )
        .bind(follower_id)
        .bind(author_id)
        .fetch_one(&self.pool)
        .await?;
        let n: i64 = row.get("n");
        Ok(n > 0)
    }

    /// Deduplicated set of authors the user follows. Storage does not
    /// uniquely constrain the pair, so DISTINCT guards the feed.
    pub async fn followed_author_ids(&self, follower_id: i64) -> Result<Vec<i64>> {
        let rows = sqlx::query("SELECT DISTINCT author_id FROM follows WHERE follower_id = ?")
            .bind(follower_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|row| row.get("author_id")).collect())
    }

    pub async fn follower_count(&self, author_id: i64) -> Result<i64> {
        let row = sqlx::query(
            "SELECT COUNT(DISTINCT follower_id) AS n FROM follows WHERE author_id = ?",
        )
        .bind(author_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get("n"))
    }

    pub async fn following_count(&self, user_id: i64) -> Result<i64> {
        let row = sqlx::query(
            "SELECT COUNT(DISTINCT author_id) AS n FROM follows WHERE follower_id = ?",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get("n"))
    }
}
