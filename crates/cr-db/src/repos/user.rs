//! User repository: accounts, directory sync, roster and leaderboard.

use std::collections::HashSet;

use cr_core::entities::User;
use cr_core::enums::{ReviewStatus, Session};
use cr_core::identity::DirectoryIdentity;
use cr_core::ids::PREFIX_USER;
use cr_core::permissions;
use cr_core::responses::{Leaderboard, Roster};
use cr_core::validation::{school_email, validate_student_id};

use crate::error::DatabaseError;
use crate::helpers::{get_bool, get_opt_string, parse_enum, placeholders};
use crate::service::ReviewService;

const SELECT_COLS: &str = "id, username, first_name, last_name, email, student_id, session, \
     is_reviewer, is_superuser, has_usable_password, receive_notifications, \
     reviews_done_as_reviewer, reviews_done_as_reviewee";

fn row_to_user(row: &libsql::Row) -> Result<User, DatabaseError> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        email: row.get(4)?,
        student_id: get_opt_string(row, 5)?,
        session: parse_enum(&row.get::<String>(6)?)?,
        is_reviewer: get_bool(row, 7)?,
        is_superuser: get_bool(row, 8)?,
        has_usable_password: get_bool(row, 9)?,
        receive_notifications: get_bool(row, 10)?,
        reviews_done_as_reviewer: row.get(11)?,
        reviews_done_as_reviewee: row.get(12)?,
    })
}

/// Fields for a new local account.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Explicit key; directory users pass their object GUID. `None` generates one.
    pub id: Option<String>,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub session: Session,
    pub is_reviewer: bool,
    pub is_superuser: bool,
    pub has_usable_password: bool,
}

impl NewUser {
    /// A local-password account with nothing but a name and session.
    #[must_use]
    pub fn local(username: impl Into<String>, session: Session) -> Self {
        Self {
            id: None,
            username: username.into(),
            first_name: String::new(),
            last_name: String::new(),
            email: String::new(),
            session,
            is_reviewer: false,
            is_superuser: false,
            has_usable_password: true,
        }
    }
}

async fn collect_users(mut rows: libsql::Rows) -> Result<Vec<User>, DatabaseError> {
    let mut users = Vec::new();
    while let Some(row) = rows.next().await? {
        users.push(row_to_user(&row)?);
    }
    Ok(users)
}

pub(crate) async fn load_user(conn: &libsql::Connection, id: &str) -> Result<User, DatabaseError> {
    let mut rows = conn
        .query(&format!("SELECT {SELECT_COLS} FROM users WHERE id = ?1"), [id])
        .await?;
    let row = rows
        .next()
        .await?
        .ok_or_else(|| DatabaseError::not_found("user", id))?;
    row_to_user(&row)
}

/// Reviewers of a session, optionally leaving one user out.
pub(crate) async fn reviewers_in_session(
    conn: &libsql::Connection,
    session: Session,
    exclude: Option<&str>,
) -> Result<Vec<User>, DatabaseError> {
    let rows = conn
        .query(
            &format!(
                "SELECT {SELECT_COLS} FROM users
                 WHERE is_reviewer = 1 AND session = ?1 AND id != ?2
                 ORDER BY username"
            ),
            libsql::params![session.as_str(), exclude.unwrap_or("")],
        )
        .await?;
    collect_users(rows).await
}

pub(crate) async fn instructors(conn: &libsql::Connection) -> Result<Vec<User>, DatabaseError> {
    let rows = conn
        .query(
            &format!("SELECT {SELECT_COLS} FROM users WHERE is_superuser = 1 ORDER BY username"),
            (),
        )
        .await?;
    collect_users(rows).await
}

async fn insert_user(conn: &libsql::Connection, new: &NewUser) -> Result<User, DatabaseError> {
    let id = match &new.id {
        Some(id) => id.clone(),
        None => crate::generate_id(conn, PREFIX_USER).await?,
    };
    conn.execute(
        "INSERT INTO users (id, username, first_name, last_name, email, session,
                            is_reviewer, is_superuser, has_usable_password)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        libsql::params![
            id.as_str(),
            new.username.as_str(),
            new.first_name.as_str(),
            new.last_name.as_str(),
            new.email.as_str(),
            new.session.as_str(),
            i64::from(new.is_reviewer),
            i64::from(new.is_superuser),
            i64::from(new.has_usable_password)
        ],
    )
    .await?;
    load_user(conn, &id).await
}

/// Hand a user's assigned reviews back to the pool and clear their drafts,
/// then delete the users. Returns the number of users deleted.
async fn delete_user_rows(
    conn: &libsql::Connection,
    ids: &[String],
) -> Result<u64, DatabaseError> {
    if ids.is_empty() {
        return Ok(0);
    }
    let list = placeholders(1, ids.len());
    let params = || ids.iter().map(|id| libsql::Value::from(id.clone()));

    conn.execute(
        &format!(
            "DELETE FROM scored_rows WHERE review_id IN (
                 SELECT id FROM reviews WHERE status = 'assigned' AND reviewer_id IN ({list}))"
        ),
        libsql::params_from_iter(params()),
    )
    .await?;
    let reopened = conn
        .execute(
            &format!(
                "UPDATE reviews SET status = '{}', reviewer_id = NULL
                 WHERE status = 'assigned' AND reviewer_id IN ({list})",
                ReviewStatus::Open.as_str()
            ),
            libsql::params_from_iter(params()),
        )
        .await?;
    if reopened > 0 {
        tracing::info!(reopened, "reopened reviews held by deleted users");
    }

    let deleted = conn
        .execute(
            &format!("DELETE FROM users WHERE is_superuser = 0 AND id IN ({list})"),
            libsql::params_from_iter(params()),
        )
        .await?;
    Ok(deleted)
}

impl ReviewService {
    /// # Errors
    ///
    /// Returns `DatabaseError` if the insert fails, e.g. on a duplicate username.
    pub async fn create_user(&self, new: &NewUser) -> Result<User, DatabaseError> {
        let tx = self.db().begin_write().await?;
        let result = insert_user(tx.conn(), new).await;
        let user = tx.finish(result).await?;
        tracing::info!(user = %user.id, username = %user.username, "user created");
        Ok(user)
    }

    /// # Errors
    ///
    /// Returns `DatabaseError::NotFound` for an unknown id.
    pub async fn get_user(&self, id: &str) -> Result<User, DatabaseError> {
        let read = self.db().read().await;
        load_user(read.conn(), id).await
    }

    /// Look a user up by username, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the query fails.
    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, DatabaseError> {
        let read = self.db().read().await;
        let mut rows = read
            .conn()
            .query(
                &format!("SELECT {SELECT_COLS} FROM users WHERE lower(username) = lower(?1)"),
                [username],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_user(&row)?)),
            None => Ok(None),
        }
    }

    /// Create or refresh the local account for a directory identity.
    ///
    /// The identity's GUID is the stable key: an existing account gets its
    /// username, names and session refreshed; a new one is created without a
    /// usable password, as an instructor when the directory says admin.
    /// Returns the user and whether it was created.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if a query fails.
    pub async fn sync_directory_identity(
        &self,
        identity: &DirectoryIdentity,
    ) -> Result<(User, bool), DatabaseError> {
        let tx = self.db().begin_write().await?;
        let result: Result<_, DatabaseError> = async {
            let conn = tx.conn();
            let updated = conn
                .execute(
                    "UPDATE users SET username = ?1, first_name = ?2, last_name = ?3, session = ?4
                     WHERE id = ?5",
                    libsql::params![
                        identity.username.as_str(),
                        identity.first_name.as_str(),
                        identity.last_name.as_str(),
                        identity.session.as_str(),
                        identity.guid.as_str()
                    ],
                )
                .await?;
            if updated > 0 {
                return Ok((load_user(conn, &identity.guid).await?, false));
            }

            let new = NewUser {
                id: Some(identity.guid.clone()),
                username: identity.username.clone(),
                first_name: identity.first_name.clone(),
                last_name: identity.last_name.clone(),
                email: identity.email.clone(),
                session: identity.session,
                is_reviewer: false,
                is_superuser: identity.is_admin,
                has_usable_password: false,
            };
            Ok((insert_user(conn, &new).await?, true))
        }
        .await;
        let (user, created) = tx.finish(result).await?;

        tracing::info!(user = %user.id, created, admin = user.is_superuser, "directory identity synced");
        Ok((user, created))
    }

    /// Record a student's id. With an email domain configured, the school
    /// address derived from name and id replaces the stored email.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Validation` for a malformed id, `NotFound` for
    /// an unknown user.
    pub async fn complete_setup(&self, user_id: &str, student_id: &str) -> Result<User, DatabaseError> {
        validate_student_id(student_id)?;

        let tx = self.db().begin_write().await?;
        let result: Result<_, DatabaseError> = async {
            let conn = tx.conn();
            let user = load_user(conn, user_id).await?;
            let email = self.settings().email_domain.as_deref().map_or_else(
                || user.email.clone(),
                |domain| school_email(&user.first_name, &user.last_name, student_id, domain),
            );
            conn.execute(
                "UPDATE users SET student_id = ?1, email = ?2 WHERE id = ?3",
                libsql::params![student_id, email.as_str(), user_id],
            )
            .await?;
            load_user(conn, user_id).await
        }
        .await;
        let user = tx.finish(result).await?;
        tracing::info!(user = %user.id, "setup completed");
        Ok(user)
    }

    /// # Errors
    ///
    /// Returns `DatabaseError::NotFound` for an unknown user.
    pub async fn set_receive_notifications(
        &self,
        user_id: &str,
        enabled: bool,
    ) -> Result<User, DatabaseError> {
        let tx = self.db().begin_write().await?;
        let result: Result<_, DatabaseError> = async {
            let conn = tx.conn();
            let changed = conn
                .execute(
                    "UPDATE users SET receive_notifications = ?1 WHERE id = ?2",
                    libsql::params![i64::from(enabled), user_id],
                )
                .await?;
            if changed == 0 {
                return Err(DatabaseError::not_found("user", user_id));
            }
            load_user(conn, user_id).await
        }
        .await;
        tx.finish(result).await
    }

    /// Make exactly `reviewer_ids` reviewers among all non-instructors.
    /// Returns how many users now hold the flag.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Forbidden` unless the actor is an instructor.
    pub async fn designate_reviewers(
        &self,
        actor_id: &str,
        reviewer_ids: &[String],
    ) -> Result<u64, DatabaseError> {
        let tx = self.db().begin_write().await?;
        let result: Result<_, DatabaseError> = async {
            let conn = tx.conn();
            let actor = load_user(conn, actor_id).await?;
            if !permissions::can_manage_roster(&actor) {
                return Err(DatabaseError::instructor_only("Designating reviewers"));
            }

            conn.execute("UPDATE users SET is_reviewer = 0 WHERE is_superuser = 0", ())
                .await?;
            if reviewer_ids.is_empty() {
                return Ok(0);
            }
            let set = conn
                .execute(
                    &format!(
                        "UPDATE users SET is_reviewer = 1
                         WHERE is_superuser = 0 AND id IN ({})",
                        placeholders(1, reviewer_ids.len())
                    ),
                    libsql::params_from_iter(
                        reviewer_ids.iter().map(|id| libsql::Value::from(id.clone())),
                    ),
                )
                .await?;
            Ok(set)
        }
        .await;
        let count = tx.finish(result).await?;
        tracing::info!(actor = actor_id, reviewers = count, "reviewers designated");
        Ok(count)
    }

    /// Delete non-instructor accounts. Reviews they had claimed go back to
    /// the pool; reviews they requested go with them.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Forbidden` unless the actor is an instructor.
    pub async fn delete_users(&self, actor_id: &str, ids: &[String]) -> Result<u64, DatabaseError> {
        let tx = self.db().begin_write().await?;
        let result: Result<_, DatabaseError> = async {
            let conn = tx.conn();
            let actor = load_user(conn, actor_id).await?;
            if !permissions::can_manage_roster(&actor) {
                return Err(DatabaseError::instructor_only("Deleting users"));
            }
            delete_user_rows(conn, ids).await
        }
        .await;
        let deleted = tx.finish(result).await?;
        tracing::info!(actor = actor_id, deleted, "users deleted");
        Ok(deleted)
    }

    /// Non-instructors grouped by session.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::Forbidden` unless the actor is an instructor.
    pub async fn roster(&self, actor_id: &str) -> Result<Roster, DatabaseError> {
        let read = self.db().read().await;
        let conn = read.conn();
        let actor = load_user(conn, actor_id).await?;
        if !permissions::can_manage_roster(&actor) {
            return Err(DatabaseError::instructor_only("The roster"));
        }

        let rows = conn
            .query(
                &format!(
                    "SELECT {SELECT_COLS} FROM users WHERE is_superuser = 0
                     ORDER BY last_name, first_name, username"
                ),
                (),
            )
            .await?;
        let (am, pm) = collect_users(rows)
            .await?
            .into_iter()
            .partition(|u| u.session == Session::Am);
        Ok(Roster { am, pm })
    }

    /// Non-instructors ranked by reviews received and reviews given.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if a query fails.
    pub async fn leaderboard(&self) -> Result<Leaderboard, DatabaseError> {
        let read = self.db().read().await;
        let conn = read.conn();
        let reviewees = conn
            .query(
                &format!(
                    "SELECT {SELECT_COLS} FROM users WHERE is_superuser = 0
                     ORDER BY reviews_done_as_reviewee DESC, username"
                ),
                (),
            )
            .await?;
        let reviewers = conn
            .query(
                &format!(
                    "SELECT {SELECT_COLS} FROM users WHERE is_superuser = 0
                     ORDER BY reviews_done_as_reviewer DESC, username"
                ),
                (),
            )
            .await?;
        Ok(Leaderboard {
            reviewees: collect_users(reviewees).await?,
            reviewers: collect_users(reviewers).await?,
        })
    }

    /// Delete every directory-backed, non-instructor account whose username
    /// is not in `present` (compared case-insensitively).
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if a query fails; nothing is deleted then.
    pub async fn delete_stale_directory_users(
        &self,
        present: &HashSet<String>,
    ) -> Result<u64, DatabaseError> {
        let present: HashSet<String> = present.iter().map(|u| u.to_lowercase()).collect();

        let tx = self.db().begin_write().await?;
        let result: Result<_, DatabaseError> = async {
            let conn = tx.conn();
            let mut rows = conn
                .query(
                    "SELECT id, username FROM users
                     WHERE is_superuser = 0 AND has_usable_password = 0",
                    (),
                )
                .await?;
            let mut stale = Vec::new();
            while let Some(row) = rows.next().await? {
                let username: String = row.get(1)?;
                if !present.contains(&username.to_lowercase()) {
                    tracing::debug!(username = %username, "stale directory account");
                    stale.push(row.get::<String>(0)?);
                }
            }
            delete_user_rows(conn, &stale).await
        }
        .await;
        let deleted = tx.finish(result).await?;
        tracing::info!(deleted, "stale directory accounts removed");
        Ok(deleted)
    }
}
