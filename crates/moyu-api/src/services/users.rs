use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use tracing::info;

use moyu_db::{Database, NewUser};
use moyu_types::api::{EmailCheckRequest, LoginRequest, RegisterRequest};
use moyu_types::models::User;

use super::{ServiceError, ServiceResult};

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn hash_password(password: &str) -> ServiceResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| ServiceError::Store(anyhow::anyhow!("password hashing failed: {}", e)))
}

fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

pub fn register(db: &Database, req: &RegisterRequest) -> ServiceResult<User> {
    req.validate().map_err(ServiceError::Validation)?;

    let email = normalize_email(&req.email);
    if db.get_user_by_email(&email)?.is_some() {
        return Err(ServiceError::EmailTaken);
    }

    let password_hash = hash_password(&req.password)?;
    let user = db.create_user(&NewUser {
        name: req.name.trim(),
        occupation: req.occupation.trim(),
        email: &email,
        password_hash: &password_hash,
    })?;

    info!("Registered user {} ({})", user.id, user.email);
    Ok(user)
}

/// Unknown email and wrong password fail identically.
pub fn login(db: &Database, req: &LoginRequest) -> ServiceResult<User> {
    req.validate().map_err(ServiceError::Validation)?;

    let user = db
        .get_user_by_email(&normalize_email(&req.email))?
        .ok_or(ServiceError::InvalidCredentials)?;

    if !verify_password(&req.password, &user.password_hash) {
        return Err(ServiceError::InvalidCredentials);
    }
    Ok(user)
}

pub fn is_email_available(db: &Database, req: &EmailCheckRequest) -> ServiceResult<bool> {
    req.validate().map_err(ServiceError::Validation)?;
    Ok(db.get_user_by_email(&normalize_email(&req.email))?.is_none())
}

pub fn get_by_id(db: &Database, id: i64) -> ServiceResult<User> {
    db.get_user_by_id(id)?.ok_or(ServiceError::NotFound("user"))
}

pub fn save_avatar(db: &Database, id: i64, file_name: &str) -> ServiceResult<User> {
    db.update_avatar(id, file_name)?.ok_or(ServiceError::NotFound("user"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(email: &str) -> RegisterRequest {
        RegisterRequest {
            name: "Sari".into(),
            occupation: "Potter".into(),
            email: email.into(),
            password: "kiln-temperature".into(),
        }
    }

    #[test]
    fn register_then_login() {
        let db = Database::open_in_memory().unwrap();
        let user = register(&db, &registration("Sari@Example.com ")).unwrap();
        assert_eq!(user.email, "sari@example.com");
        assert_ne!(user.password_hash, "kiln-temperature");

        let logged_in = login(
            &db,
            &LoginRequest {
                email: "sari@example.com".into(),
                password: "kiln-temperature".into(),
            },
        )
        .unwrap();
        assert_eq!(logged_in.id, user.id);
    }

    #[test]
    fn duplicate_email_is_taken() {
        let db = Database::open_in_memory().unwrap();
        register(&db, &registration("sari@example.com")).unwrap();
        assert!(matches!(
            register(&db, &registration("SARI@example.com")),
            Err(ServiceError::EmailTaken)
        ));
    }

    #[test]
    fn wrong_password_and_unknown_email_fail_the_same_way() {
        let db = Database::open_in_memory().unwrap();
        register(&db, &registration("sari@example.com")).unwrap();

        let wrong = login(
            &db,
            &LoginRequest {
                email: "sari@example.com".into(),
                password: "not-the-password".into(),
            },
        );
        let unknown = login(
            &db,
            &LoginRequest {
                email: "nobody@example.com".into(),
                password: "kiln-temperature".into(),
            },
        );
        assert!(matches!(wrong, Err(ServiceError::InvalidCredentials)));
        assert!(matches!(unknown, Err(ServiceError::InvalidCredentials)));
    }

    #[test]
    fn email_availability() {
        let db = Database::open_in_memory().unwrap();
        register(&db, &registration("sari@example.com")).unwrap();

        let taken = EmailCheckRequest { email: "sari@example.com".into() };
        let free = EmailCheckRequest { email: "budi@example.com".into() };
        assert!(!is_email_available(&db, &taken).unwrap());
        assert!(is_email_available(&db, &free).unwrap());
    }

    #[test]
    fn lookup_of_missing_user_is_not_found() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(get_by_id(&db, 99), Err(ServiceError::NotFound("user"))));
    }
}
