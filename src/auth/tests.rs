use super::*;
use crate::database::sqlite::queries::UserQueries;
use anyhow::Result;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tempfile::TempDir;

const SECRET: &str = "test-secret";
const PASSWORD: &str = "correct horse battery staple";

#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<OutgoingMail>>,
    failing: AtomicBool,
}

impl RecordingMailer {
    fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().expect("mailer lock").clone()
    }

    fn last_token(&self) -> String {
        let mail = self.sent().pop().expect("a mail should have been sent");
        let (_, rest) = mail
            .html_body
            .split_once("token=")
            .expect("mail should contain a token");
        rest.split('"').next().expect("token").to_string()
    }
}

#[async_trait::async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, mail: OutgoingMail) -> anyhow::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("SMTP relay refused the connection");
        }
        self.sent.lock().expect("mailer lock").push(mail);
        Ok(())
    }
}

struct Fixture {
    _temp_dir: TempDir,
    service: AuthService,
    mailer: Arc<RecordingMailer>,
}

async fn fixture() -> Result<Fixture> {
    let temp_dir = TempDir::new()?;
    let database = Database::open(&temp_dir.path().join("users.db")).await?;
    let mailer = Arc::new(RecordingMailer::default());
    let service = AuthService::new(
        database,
        SECRET,
        TokenLifetimes::from(&AuthConfig::default()),
        Arc::clone(&mailer) as Arc<dyn Mailer>,
        "http://lawyer.test/",
    );

    Ok(Fixture {
        _temp_dir: temp_dir,
        service,
        mailer,
    })
}

fn request(email: &str) -> RegisterRequest {
    RegisterRequest {
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        email: email.to_string(),
        password: PASSWORD.to_string(),
    }
}

async fn verified_user(fixture: &Fixture, email: &str) -> Result<User> {
    fixture.service.register(request(email)).await?;
    let token = fixture.mailer.last_token();
    Ok(fixture.service.verify_email(&token).await?)
}

#[test]
fn password_hash_round_trip() {
    let hash = hash_password(PASSWORD).expect("hashing should succeed");

    assert!(hash.starts_with("$argon2"));
    assert!(verify_password(PASSWORD, &hash));
    assert!(!verify_password("wrong", &hash));
}

#[test]
fn password_hashes_are_salted() {
    let first = hash_password(PASSWORD).expect("hashing should succeed");
    let second = hash_password(PASSWORD).expect("hashing should succeed");
    assert_ne!(first, second);
}

#[test]
fn malformed_hash_never_verifies() {
    assert!(!verify_password(PASSWORD, "not-a-phc-string"));
    assert!(!verify_password("", ""));
}

#[test]
fn token_kinds_are_not_interchangeable() {
    let keys = TokenKeys::new(SECRET);
    let refresh = keys
        .issue_session(7, TokenKind::Refresh, Duration::from_secs(60))
        .expect("signing should succeed");

    assert_eq!(keys.user_id(&refresh, TokenKind::Refresh).ok(), Some(7));
    assert!(matches!(
        keys.user_id(&refresh, TokenKind::Access),
        Err(TokenError::WrongKind {
            expected: TokenKind::Access,
            actual: TokenKind::Refresh
        })
    ));
    assert!(keys.activation_email(&refresh).is_err());
}

#[test]
fn activation_token_carries_email() {
    let keys = TokenKeys::new(SECRET);
    let token = keys
        .issue_activation("ada@example.com", Duration::from_secs(60))
        .expect("signing should succeed");

    assert_eq!(
        keys.activation_email(&token).ok().as_deref(),
        Some("ada@example.com")
    );
    assert!(keys.user_id(&token, TokenKind::Activation).is_err());
}

#[test]
fn expired_token_is_rejected() {
    let keys = TokenKeys::new(SECRET);
    let token = keys
        .sign(&Claims {
            id: Some(1),
            email: None,
            kind: TokenKind::Access,
            exp: jsonwebtoken::get_current_timestamp() - 3600,
        })
        .expect("signing should succeed");

    assert!(matches!(
        keys.decode(&token, TokenKind::Access),
        Err(TokenError::Invalid(_))
    ));
}

#[test]
fn foreign_signature_is_rejected() {
    let token = TokenKeys::new("other-secret")
        .issue_session(1, TokenKind::Access, Duration::from_secs(60))
        .expect("signing should succeed");

    assert!(TokenKeys::new(SECRET).decode(&token, TokenKind::Access).is_err());
    assert!(TokenKeys::new(SECRET).decode("garbage", TokenKind::Access).is_err());
}

#[test]
fn email_validation() {
    assert!(is_valid_email("ada@example.com"));
    assert!(is_valid_email("first.last+tag@mail.example.org"));
    assert!(!is_valid_email("ada"));
    assert!(!is_valid_email("@example.com"));
    assert!(!is_valid_email("ada@example"));
    assert!(!is_valid_email("ada@@example.com"));
    assert!(!is_valid_email("ada@example..com"));
    assert!(!is_valid_email("ada lovelace@example.com"));
}

#[test]
fn lifetimes_from_default_config() {
    let lifetimes = TokenLifetimes::from(&AuthConfig::default());

    assert_eq!(lifetimes.access, Duration::from_secs(3600));
    assert_eq!(lifetimes.refresh, Duration::from_secs(7 * 24 * 3600));
    assert_eq!(lifetimes.activation, Duration::from_secs(24 * 3600));
}

#[tokio::test]
async fn service_requires_a_secret() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let database = Database::open(&temp_dir.path().join("users.db")).await?;

    let result = AuthService::from_config(&Config::default(), database, Arc::new(LogMailer));
    assert!(matches!(result, Err(ConfigError::MissingValue(_))));
    Ok(())
}

#[tokio::test]
async fn register_creates_unverified_user_and_mails_link() -> Result<()> {
    let fixture = fixture().await?;

    let user = fixture.service.register(request(" ada@example.com ")).await?;

    assert_eq!(user.email, "ada@example.com");
    assert!(user.is_active);
    assert!(!user.is_verified);
    assert_ne!(user.password, PASSWORD);

    let sent = fixture.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "ada@example.com");
    assert_eq!(sent[0].subject, "Activate your account");
    assert!(sent[0].html_body.starts_with(
        "Activate your Smart Lawyer account using this link: <a href=\"http://lawyer.test/auth/verify?token="
    ));

    Ok(())
}

#[tokio::test]
async fn register_survives_mail_failure() -> Result<()> {
    let fixture = fixture().await?;
    fixture.mailer.failing.store(true, Ordering::SeqCst);

    let user = fixture.service.register(request("ada@example.com")).await?;
    assert!(!user.is_verified);
    assert!(fixture.mailer.sent().is_empty());

    fixture.mailer.failing.store(false, Ordering::SeqCst);
    fixture.service.resend_verification("ada@example.com").await?;
    let verified = fixture.service.verify_email(&fixture.mailer.last_token()).await?;
    assert_eq!(verified.id, user.id);
    Ok(())
}

#[tokio::test]
async fn blocking_password_helpers_match_sync_ones() -> Result<()> {
    let hash = hash_password_blocking(PASSWORD.to_string()).await?;

    assert!(verify_password(PASSWORD, &hash));
    assert!(verify_password_blocking(PASSWORD.to_string(), hash.clone()).await);
    assert!(!verify_password_blocking("wrong".to_string(), hash).await);
    assert!(!verify_password_blocking(PASSWORD.to_string(), "not-a-hash".to_string()).await);
    Ok(())
}

#[tokio::test]
async fn register_rejects_invalid_email() -> Result<()> {
    let fixture = fixture().await?;

    let result = fixture.service.register(request("not-an-email")).await;

    assert!(matches!(result, Err(AuthError::Unprocessable(_))));
    assert!(fixture.mailer.sent().is_empty());
    Ok(())
}

#[tokio::test]
async fn register_twice_while_unverified_conflicts() -> Result<()> {
    let fixture = fixture().await?;
    fixture.service.register(request("ada@example.com")).await?;

    let result = fixture.service.register(request("ADA@example.com")).await;

    match result {
        Err(AuthError::Conflict(message)) => assert_eq!(message, "Email address not verified"),
        other => panic!("expected conflict, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn register_after_verification_is_unprocessable() -> Result<()> {
    let fixture = fixture().await?;
    verified_user(&fixture, "ada@example.com").await?;

    let result = fixture.service.register(request("ada@example.com")).await;

    match result {
        Err(AuthError::Unprocessable(message)) => {
            assert_eq!(message, "Email is already registered and verified with us.");
        }
        other => panic!("expected unprocessable, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn verify_email_once() -> Result<()> {
    let fixture = fixture().await?;
    fixture.service.register(request("ada@example.com")).await?;
    let token = fixture.mailer.last_token();

    let user = fixture.service.verify_email(&token).await?;
    assert!(user.is_verified);
    assert!(user.verified_at.is_some());

    let again = fixture.service.verify_email(&token).await;
    assert_eq!(
        again.err().map(|e| e.to_string()).as_deref(),
        Some("Email is already verified.")
    );
    Ok(())
}

#[tokio::test]
async fn verify_rejects_garbage_and_session_tokens() -> Result<()> {
    let fixture = fixture().await?;
    let user = fixture.service.register(request("ada@example.com")).await?;
    let access = fixture
        .service
        .keys()
        .issue_session(user.id, TokenKind::Access, Duration::from_secs(60))?;

    for token in ["garbage", access.as_str()] {
        let result = fixture.service.verify_email(token).await;
        assert_eq!(
            result.err().map(|e| e.to_string()).as_deref(),
            Some("Invalid token.")
        );
    }
    Ok(())
}

#[tokio::test]
async fn token_grant_for_verified_user() -> Result<()> {
    let fixture = fixture().await?;
    let user = verified_user(&fixture, "ada@example.com").await?;

    let tokens = fixture.service.issue_tokens("ada@example.com", PASSWORD).await?;

    assert_eq!(tokens.token_type, "Bearer");
    assert_eq!(tokens.expires_in, 3600);
    let authenticated = fixture.service.authenticate(&tokens.access_token).await?;
    assert_eq!(authenticated.id, user.id);
    Ok(())
}

#[tokio::test]
async fn token_grant_failures() -> Result<()> {
    let fixture = fixture().await?;
    verified_user(&fixture, "ada@example.com").await?;

    let unknown = fixture.service.issue_tokens("bob@example.com", PASSWORD).await;
    assert_eq!(
        unknown.err().map(|e| e.to_string()).as_deref(),
        Some("Email is not registered with us.")
    );

    let wrong = fixture.service.issue_tokens("ada@example.com", "nope").await;
    assert_eq!(
        wrong.err().map(|e| e.to_string()).as_deref(),
        Some("Invalid Login Credentials.")
    );
    Ok(())
}

#[tokio::test]
async fn unverified_user_gets_mail_resent() -> Result<()> {
    let fixture = fixture().await?;
    fixture.service.register(request("ada@example.com")).await?;

    let result = fixture.service.issue_tokens("ada@example.com", PASSWORD).await;

    assert!(matches!(result, Err(AuthError::BadRequest(_))));
    assert_eq!(
        result.err().map(|e| e.to_string()).as_deref(),
        Some("Your account is unverified. We have resent the account verification email.")
    );
    assert_eq!(fixture.mailer.sent().len(), 2);
    Ok(())
}

#[tokio::test]
async fn inactive_user_cannot_sign_in() -> Result<()> {
    let fixture = fixture().await?;
    let user = verified_user(&fixture, "ada@example.com").await?;
    UserQueries::set_active(fixture.service.database().pool(), user.id, false).await?;

    let result = fixture.service.issue_tokens("ada@example.com", PASSWORD).await;

    assert_eq!(
        result.err().map(|e| e.to_string()).as_deref(),
        Some("Your account is inactive. Please contact support.")
    );
    Ok(())
}

#[tokio::test]
async fn refresh_echoes_the_refresh_token() -> Result<()> {
    let fixture = fixture().await?;
    verified_user(&fixture, "ada@example.com").await?;
    let tokens = fixture.service.issue_tokens("ada@example.com", PASSWORD).await?;

    let refreshed = fixture.service.refresh(&tokens.refresh_token).await?;

    assert_eq!(refreshed.refresh_token, tokens.refresh_token);
    assert!(fixture.service.authenticate(&refreshed.access_token).await.is_ok());

    let misuse = fixture.service.refresh(&tokens.access_token).await;
    match misuse {
        Err(AuthError::Unauthorized(message)) => assert_eq!(message, "Invalid refresh token."),
        other => panic!("expected unauthorized, got {:?}", other),
    }
    Ok(())
}

#[tokio::test]
async fn authenticate_rejects_non_access_tokens() -> Result<()> {
    let fixture = fixture().await?;
    verified_user(&fixture, "ada@example.com").await?;
    let tokens = fixture.service.issue_tokens("ada@example.com", PASSWORD).await?;

    let result = fixture.service.authenticate(&tokens.refresh_token).await;
    assert!(matches!(result, Err(AuthError::Unauthorized(_))));

    let missing_user = fixture
        .service
        .keys()
        .issue_session(999, TokenKind::Access, Duration::from_secs(60))?;
    let result = fixture.service.authenticate(&missing_user).await;
    assert!(matches!(result, Err(AuthError::Unauthorized(_))));
    Ok(())
}

#[tokio::test]
async fn resend_verification_rules() -> Result<()> {
    let fixture = fixture().await?;

    let unknown = fixture.service.resend_verification("nobody@example.com").await;
    assert!(matches!(unknown, Err(AuthError::BadRequest(_))));

    fixture.service.register(request("ada@example.com")).await?;
    fixture.service.resend_verification("ada@example.com").await?;
    assert_eq!(fixture.mailer.sent().len(), 2);

    let token = fixture.mailer.last_token();
    fixture.service.verify_email(&token).await?;
    let verified = fixture.service.resend_verification("ada@example.com").await;
    assert_eq!(
        verified.err().map(|e| e.to_string()).as_deref(),
        Some("Email is already verified.")
    );
    Ok(())
}
