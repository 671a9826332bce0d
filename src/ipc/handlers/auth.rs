use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{optional_str, required_str};
use crate::ipc::types::{AppState, Request, Role, Session};
use rusqlite::OptionalExtension;
use serde_json::json;
use sha2::{Digest, Sha256};
use uuid::Uuid;

fn hash_with_salt(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

// Stored as "salt$digest".
fn hash_password(password: &str) -> String {
    let salt = Uuid::new_v4().simple().to_string();
    format!("{}${}", salt, hash_with_salt(&salt, password))
}

fn verify_password(stored: &str, password: &str) -> bool {
    let Some((salt, digest)) = stored.split_once('$') else {
        return false;
    };
    hash_with_salt(salt, password) == digest
}

fn handle_register(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let email = match required_str(req, "email") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let password = match required_str(req, "password") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let name = optional_str(req, "name").unwrap_or_else(|| email.clone());

    let taken: Option<i64> = match conn
        .query_row("SELECT 1 FROM users WHERE email = ?", [&email], |r| {
            r.get(0)
        })
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if taken.is_some() {
        return err(&req.id, "email_taken", "email already exists", None);
    }

    // The first account bootstraps administration; everyone after is a
    // standard user.
    let user_count: i64 = match conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0)) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let role = if user_count == 0 {
        Role::Admin
    } else {
        Role::Standard
    };

    let user_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO users(id, email, name, password_hash, role, created_at)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &user_id,
            &email,
            &name,
            hash_password(&password),
            role.as_str(),
            db::now_ts(),
        ),
    ) {
        return err(&req.id, "db_insert_failed", e.to_string(), None);
    }

    ok(
        &req.id,
        json!({
            "userId": user_id,
            "email": email,
            "name": name,
            "role": role.as_str(),
        }),
    )
}

fn handle_login(state: &mut AppState, req: &Request) -> serde_json::Value {
    let email = match required_str(req, "email") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let password = match required_str(req, "password") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let looked_up = {
        let Some(conn) = state.db.as_ref() else {
            return err(&req.id, "no_workspace", "select a workspace first", None);
        };
        conn.query_row(
            "SELECT id, name, password_hash, role FROM users WHERE email = ?",
            [&email],
            |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, String>(2)?,
                    r.get::<_, String>(3)?,
                ))
            },
        )
        .optional()
    };

    let row = match looked_up {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    // A uniform failure whether the account is unknown or the password wrong.
    let Some((user_id, name, password_hash, role)) = row else {
        return err(&req.id, "invalid_credentials", "invalid credentials", None);
    };
    if !verify_password(&password_hash, &password) {
        return err(&req.id, "invalid_credentials", "invalid credentials", None);
    }

    let role = Role::from_db(&role);
    state.session = Some(Session {
        user_id: user_id.clone(),
        email: email.clone(),
        name: name.clone(),
        role,
    });

    ok(
        &req.id,
        json!({
            "userId": user_id,
            "email": email,
            "name": name,
            "role": role.as_str(),
        }),
    )
}

fn handle_logout(state: &mut AppState, req: &Request) -> serde_json::Value {
    state.session = None;
    ok(&req.id, json!({ "ok": true }))
}

fn handle_profile_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(session) = state.session.clone() else {
        return err(&req.id, "unauthorized", "login required", None);
    };

    let name = optional_str(req, "name");
    let new_password = optional_str(req, "newPassword");
    let current_password = optional_str(req, "currentPassword");

    let updated_name = {
        let Some(conn) = state.db.as_ref() else {
            return err(&req.id, "no_workspace", "select a workspace first", None);
        };

        if let Some(new_password) = &new_password {
            let Some(current) = current_password else {
                return err(
                    &req.id,
                    "bad_params",
                    "currentPassword is required to set a new password",
                    None,
                );
            };
            let stored: String = match conn.query_row(
                "SELECT password_hash FROM users WHERE id = ?",
                [&session.user_id],
                |r| r.get(0),
            ) {
                Ok(v) => v,
                Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
            };
            if !verify_password(&stored, &current) {
                return err(&req.id, "bad_params", "incorrect current password", None);
            }
            if let Err(e) = conn.execute(
                "UPDATE users SET password_hash = ? WHERE id = ?",
                (hash_password(new_password), &session.user_id),
            ) {
                return err(&req.id, "db_update_failed", e.to_string(), None);
            }
        }

        if let Some(name) = &name {
            if let Err(e) = conn.execute(
                "UPDATE users SET name = ? WHERE id = ?",
                (name, &session.user_id),
            ) {
                return err(&req.id, "db_update_failed", e.to_string(), None);
            }
        }

        name.clone().unwrap_or_else(|| session.name.clone())
    };

    let user_id = session.user_id.clone();
    state.session = Some(Session {
        name: updated_name.clone(),
        ..session
    });

    ok(
        &req.id,
        json!({
            "userId": user_id,
            "name": updated_name,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "auth.register" => Some(handle_register(state, req)),
        "auth.login" => Some(handle_login(state, req)),
        "auth.logout" => Some(handle_logout(state, req)),
        "profile.update" => Some(handle_profile_update(state, req)),
        _ => None,
    }
}
