//! Optional first-run data. Never overwrites existing rows.

use anyhow::Context;
use tracing::info;

use inkpost_api::auth::hash_password;
use inkpost_db::Database;
use inkpost_db::articles::NewArticle;
use inkpost_db::users::NewUser;

pub const CATEGORIES: &[&str] = &[
    "Technology",
    "Health",
    "Business",
    "Education",
    "Entertainment",
];

const ADMIN_USERNAME: &str = "admin";
const ADMIN_EMAIL: &str = "admin@example.com";

struct Sample {
    title: &'static str,
    slug: &'static str,
    content: &'static str,
    tags: &'static [&'static str],
}

const SAMPLES: &[Sample] = &[
    Sample {
        title: "Getting Started with Rust",
        slug: "getting-started-with-rust",
        content: "Ownership, borrowing and lifetimes are the three ideas everything else builds on.",
        tags: &["rust", "beginners"],
    },
    Sample {
        title: "Async I/O in Practice",
        slug: "async-io-in-practice",
        content: "An executor, a reactor and a handful of futures go a long way.",
        tags: &["rust", "async"],
    },
    Sample {
        title: "Designing REST APIs",
        slug: "designing-rest-apis",
        content: "Resources, verbs and status codes: a short field guide.",
        tags: &["api", "http"],
    },
    Sample {
        title: "SQLite in Production",
        slug: "sqlite-in-production",
        content: "WAL mode, foreign keys and a single writer cover most small services.",
        tags: &["sqlite", "databases"],
    },
    Sample {
        title: "Testing HTTP Handlers",
        slug: "testing-http-handlers",
        content: "Drive the router in-process and assert on status codes and bodies.",
        tags: &["testing", "api"],
    },
];

pub fn run(db: &Database, admin_password: Option<&str>) -> anyhow::Result<()> {
    for name in CATEGORIES {
        db.find_or_create_category(name)
            .with_context(|| format!("seeding category {name}"))?;
    }
    info!(count = CATEGORIES.len(), "categories seeded");

    let Some(password) = admin_password else {
        info!("INKPOST_SEED_ADMIN_PASSWORD not set, skipping admin user and sample articles");
        return Ok(());
    };

    let admin_id = match db.find_login(ADMIN_USERNAME)? {
        Some(row) => row.user.id,
        None => {
            let password_hash = hash_password(password).context("hashing admin password")?;
            let user = db.create_user(&NewUser {
                username: ADMIN_USERNAME,
                email: ADMIN_EMAIL,
                password_hash: &password_hash,
                first_name: "Admin",
                last_name: "User",
                nickname: "admin",
            })?;
            info!(user_id = user.id, "admin user created");
            user.id
        }
    };

    let mut created = 0;
    for sample in SAMPLES {
        if db.article_row_by_slug(sample.slug)?.is_some() {
            continue;
        }
        let tag_names: Vec<String> = sample.tags.iter().map(|t| t.to_string()).collect();
        db.create_article(&NewArticle {
            title: sample.title,
            slug: sample.slug,
            content: sample.content,
            author_id: admin_id,
            category_name: CATEGORIES[0],
            tag_names: &tag_names,
        })
        .with_context(|| format!("seeding article {}", sample.slug))?;
        created += 1;
    }
    info!(created, "sample articles seeded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_only_without_admin_password() {
        let db = Database::open_in_memory().unwrap();
        run(&db, None).unwrap();
        assert_eq!(db.list_categories().unwrap().len(), CATEGORIES.len());
        assert!(db.find_login(ADMIN_USERNAME).unwrap().is_none());
    }

    #[test]
    fn seeding_twice_is_harmless() {
        let db = Database::open_in_memory().unwrap();
        run(&db, Some("admin-pass")).unwrap();
        run(&db, Some("admin-pass")).unwrap();

        assert_eq!(db.list_categories().unwrap().len(), CATEGORIES.len());
        let articles = db.list_articles(&Default::default()).unwrap();
        assert_eq!(articles.len(), SAMPLES.len());
        assert!(articles.iter().all(|a| a.author.username == ADMIN_USERNAME));
        assert!(
            articles
                .iter()
                .all(|a| a.category.as_ref().is_some_and(|c| c.name == "Technology"))
        );
    }
}
