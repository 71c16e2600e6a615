//! Fixtures shared by the unit tests

use migration::Migrator;
use sea_orm::ConnectOptions;
use tempfile::TempDir;

use crate::{entity::Role, prelude::*, sv};

/// Fresh in-memory database with the full schema. A single connection keeps
/// every query on the same in-memory file.
pub async fn db() -> DatabaseConnection {
  let mut options = ConnectOptions::new("sqlite::memory:");
  options.max_connections(1).sqlx_logging(false);

  let db = Database::connect(options).await.unwrap();
  Migrator::up(&db, None).await.unwrap();
  db
}

/// On-disk database behind a multi-connection pool, so concurrent callers
/// really hold separate connections. Keep `dir` alive for the test.
pub async fn file_db(dir: &TempDir) -> DatabaseConnection {
  let path = dir.path().join("quota.db");
  let url = format!("sqlite://{}?mode=rwc", path.display());
  let mut options = ConnectOptions::new(url);
  options.max_connections(8).sqlx_logging(false);

  let db = Database::connect(options).await.unwrap();
  Migrator::up(&db, None).await.unwrap();
  db
}

/// Two academies with a full hierarchy each, two platform admins and two
/// bots. Every user's token is `tok-<id>`.
pub async fn academy(db: &DatabaseConnection) {
  let users = sv::User::new(db);

  let people = [
    ("root", Role::SuperAdmin, None),
    ("admin", Role::Admin, None),
    ("d1", Role::Director, Some(1)),
    ("t1", Role::Teacher, Some(1)),
    ("s1", Role::Student, Some(1)),
    ("d2", Role::Director, Some(2)),
    ("t2", Role::Teacher, Some(2)),
    ("s2", Role::Student, Some(2)),
  ];

  for (id, role, academy) in people {
    users
      .create(id, id, role, academy, Some(format!("tok-{id}")))
      .await
      .unwrap();
  }

  let catalog = sv::Catalog::new(db);
  catalog.create("bot-A", "Math tutor").await.unwrap();
  catalog.create("bot-B", "Essay coach").await.unwrap();
}
