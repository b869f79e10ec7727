//! 二次验证码：签发、投递与一次性校验
//!
//! 每个账号同一时刻最多一个有效验证码，重新签发会覆盖旧的。
//! 过期记录只在校验时惰性清理，没有后台回收。
//! 校验次数不做限制：6 位码在 5 分钟窗口内可被暴力尝试，需要时在外层加限流。

use crate::error::{AppError, AppResult};
use crate::external::MessageSender;
use crate::models::{DeliveryMethod, SendTwoFactorResponse};
use crate::services::AdminDirectory;
use crate::utils::{generate_six_digit_code, mask_email, mask_phone, normalize_phone, phones_match};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// 验证码有效期（秒）
pub const CHALLENGE_TTL_SECS: i64 = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationChallenge {
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub method: DeliveryMethod,
}

/// 验证码存储。`insert` 覆盖同账号旧记录，`remove` 返回被删除的记录
#[async_trait]
pub trait ChallengeStore: Send + Sync {
    async fn insert(&self, account_id: &str, challenge: VerificationChallenge) -> AppResult<()>;

    async fn get(&self, account_id: &str) -> AppResult<Option<VerificationChallenge>>;

    async fn remove(&self, account_id: &str) -> AppResult<Option<VerificationChallenge>>;
}

#[derive(Clone, Default)]
pub struct InMemoryChallengeStore {
    inner: Arc<RwLock<HashMap<String, VerificationChallenge>>>,
}

impl InMemoryChallengeStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}

#[async_trait]
impl ChallengeStore for InMemoryChallengeStore {
    async fn insert(&self, account_id: &str, challenge: VerificationChallenge) -> AppResult<()> {
        self.inner
            .write()
            .await
            .insert(account_id.to_string(), challenge);
        Ok(())
    }

    async fn get(&self, account_id: &str) -> AppResult<Option<VerificationChallenge>> {
        Ok(self.inner.read().await.get(account_id).cloned())
    }

    async fn remove(&self, account_id: &str) -> AppResult<Option<VerificationChallenge>> {
        Ok(self.inner.write().await.remove(account_id))
    }
}

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Clone)]
pub struct ChallengeManager {
    store: Arc<dyn ChallengeStore>,
    directory: AdminDirectory,
    senders: HashMap<DeliveryMethod, Arc<dyn MessageSender>>,
    clock: Clock,
}

impl ChallengeManager {
    pub fn new(store: Arc<dyn ChallengeStore>, directory: AdminDirectory) -> Self {
        Self {
            store,
            directory,
            senders: HashMap::new(),
            clock: Arc::new(Utc::now),
        }
    }

    /// 为某种投递方式注册通道
    pub fn with_sender(mut self, method: DeliveryMethod, sender: Arc<dyn MessageSender>) -> Self {
        self.senders.insert(method, sender);
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    /// 签发验证码并投递
    ///
    /// 手机类通道要求 `contact` 与账号登记的手机号归一化后一致；邮件通道始终发往登记邮箱。
    pub async fn issue(
        &self,
        account_id: &str,
        method: DeliveryMethod,
        contact: Option<&str>,
    ) -> AppResult<SendTwoFactorResponse> {
        let principal = self
            .directory
            .find(account_id)
            .ok_or(AppError::InvalidCredentials)?;
        let account_key = account_key(&principal.email);

        let (destination, masked) = if method.requires_phone() {
            let submitted = contact.map(str::trim).filter(|c| !c.is_empty()).ok_or_else(|| {
                AppError::ValidationError(format!(
                    "phoneNumber is required for {method} delivery"
                ))
            })?;
            let registered = principal
                .phone_number
                .as_deref()
                .ok_or(AppError::InvalidContact)?;
            let country_code = self.directory.country_code();
            if !phones_match(submitted, registered, country_code) {
                return Err(AppError::InvalidContact);
            }
            let normalized = normalize_phone(registered, country_code);
            let masked = mask_phone(&normalized);
            (normalized, masked)
        } else {
            (principal.email.clone(), mask_email(&principal.email))
        };

        let sender = self.senders.get(&method).ok_or_else(|| {
            AppError::DeliveryFailure(format!("{method} delivery is not configured"))
        })?;

        let code = generate_six_digit_code();
        let challenge = VerificationChallenge {
            code: code.clone(),
            expires_at: self.now() + Duration::seconds(CHALLENGE_TTL_SECS),
            method,
        };
        self.store.insert(&account_key, challenge).await?;

        let body = format!(
            "Tu código de verificación es: {code}. Vence en {} minutos.",
            CHALLENGE_TTL_SECS / 60
        );
        if let Err(e) = sender.send_text(&destination, &body).await {
            // 投递失败时撤销刚签发的验证码；期间被重新签发的新码要放回
            match self.store.remove(&account_key).await? {
                Some(newer) if newer.code != code => {
                    self.store.insert(&account_key, newer).await?;
                }
                _ => {}
            }
            return Err(match e {
                AppError::DeliveryFailure(_) => e,
                other => AppError::DeliveryFailure(other.to_string()),
            });
        }

        log::info!("Two-factor code issued via {method} to {masked}");

        Ok(SendTwoFactorResponse {
            method,
            destination: masked,
            expires_in: CHALLENGE_TTL_SECS,
        })
    }

    /// 校验验证码，成功即销毁并返回被消费的记录
    pub async fn verify(
        &self,
        account_id: &str,
        submitted: &str,
    ) -> AppResult<VerificationChallenge> {
        let account_key = account_key(account_id);
        let challenge = self
            .store
            .get(&account_key)
            .await?
            .ok_or(AppError::ChallengeNotFound)?;

        if self.now() > challenge.expires_at {
            self.store.remove(&account_key).await?;
            return Err(AppError::ChallengeExpired);
        }

        if !codes_equal(&challenge.code, submitted.trim()) {
            return Err(AppError::ChallengeMismatch);
        }

        // 以删除成功作为消费点，并发校验只有一个能拿到记录
        match self.store.remove(&account_key).await? {
            Some(removed) if removed.code == challenge.code => Ok(removed),
            Some(newer) => {
                // 期间被重新签发，放回新的验证码
                self.store.insert(&account_key, newer).await?;
                Err(AppError::ChallengeMismatch)
            }
            None => Err(AppError::ChallengeNotFound),
        }
    }
}

fn account_key(account_id: &str) -> String {
    account_id.trim().to_ascii_lowercase()
}

fn codes_equal(expected: &str, submitted: &str) -> bool {
    if expected.len() != submitted.len() {
        return false;
    }
    expected
        .bytes()
        .zip(submitted.bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::admin_directory::tests::principal;
    use std::sync::Mutex;

    /// 记录所有投递内容，可配置为失败
    #[derive(Default)]
    struct RecordingSender {
        sent: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    impl RecordingSender {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        fn last_code(&self) -> String {
            let sent = self.sent.lock().unwrap();
            let (_, body) = sent.last().expect("nothing sent");
            body.chars()
                .filter(|c| c.is_ascii_digit())
                .take(6)
                .collect()
        }
    }

    #[async_trait]
    impl MessageSender for RecordingSender {
        fn channel(&self) -> &'static str {
            "test"
        }

        async fn send_text(&self, to: &str, body: &str) -> AppResult<()> {
            self.sent
                .lock()
                .unwrap()
                .push((to.to_string(), body.to_string()));
            if self.fail {
                Err(AppError::DeliveryFailure("boom".to_string()))
            } else {
                Ok(())
            }
        }
    }

    struct Fixture {
        manager: ChallengeManager,
        store: InMemoryChallengeStore,
        whatsapp: Arc<RecordingSender>,
        email: Arc<RecordingSender>,
        now: Arc<Mutex<DateTime<Utc>>>,
    }

    impl Fixture {
        fn advance(&self, secs: i64) {
            let mut now = self.now.lock().unwrap();
            *now += Duration::seconds(secs);
        }
    }

    fn fixture() -> Fixture {
        let directory = AdminDirectory::new(
            vec![
                principal("admin@example.com", "Password123", Some("+52 55 1234 5678")),
                principal("nophone@example.com", "Password123", None),
            ],
            "52",
        );
        let store = InMemoryChallengeStore::new();
        let whatsapp = Arc::new(RecordingSender::default());
        let email = Arc::new(RecordingSender::default());
        let now = Arc::new(Mutex::new(Utc::now()));
        let clock_now = now.clone();
        let manager = ChallengeManager::new(Arc::new(store.clone()), directory)
            .with_sender(DeliveryMethod::Whatsapp, whatsapp.clone())
            .with_sender(DeliveryMethod::Email, email.clone())
            .with_clock(Arc::new(move || *clock_now.lock().unwrap()));
        Fixture {
            manager,
            store,
            whatsapp,
            email,
            now,
        }
    }

    #[tokio::test]
    async fn test_issue_normalizes_and_delivers() {
        let f = fixture();
        let resp = f
            .manager
            .issue("admin@example.com", DeliveryMethod::Whatsapp, Some("55-1234-5678"))
            .await
            .unwrap();

        assert_eq!(resp.expires_in, 300);
        assert_eq!(resp.destination, "********5678");
        let sent = f.whatsapp.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "525512345678");

        let stored = f.store.get("admin@example.com").await.unwrap().unwrap();
        assert_eq!(stored.code.len(), 6);
        assert!(sent[0].1.contains(&stored.code));
        assert_eq!(stored.method, DeliveryMethod::Whatsapp);
    }

    #[tokio::test]
    async fn test_issue_rejects_contact_mismatch() {
        let f = fixture();
        let err = f
            .manager
            .issue("admin@example.com", DeliveryMethod::Whatsapp, Some("5500000000"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidContact));
        assert!(f.whatsapp.sent.lock().unwrap().is_empty());
        assert_eq!(f.store.len().await, 0);
    }

    #[tokio::test]
    async fn test_issue_requires_phone_for_phone_method() {
        let f = fixture();
        let err = f
            .manager
            .issue("admin@example.com", DeliveryMethod::Whatsapp, Some("  "))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        let err = f
            .manager
            .issue("nophone@example.com", DeliveryMethod::Whatsapp, Some("5512345678"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidContact));
    }

    #[tokio::test]
    async fn test_email_ignores_contact() {
        let f = fixture();
        let resp = f
            .manager
            .issue("ADMIN@example.com", DeliveryMethod::Email, None)
            .await
            .unwrap();
        assert_eq!(resp.destination, "a***@example.com");
        assert_eq!(f.email.sent.lock().unwrap()[0].0, "admin@example.com");
    }

    #[tokio::test]
    async fn test_unconfigured_method_is_delivery_failure() {
        let f = fixture();
        let err = f
            .manager
            .issue("admin@example.com", DeliveryMethod::Sms, Some("5512345678"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DeliveryFailure(_)));
    }

    #[tokio::test]
    async fn test_failed_delivery_is_surfaced_and_revoked() {
        let directory = AdminDirectory::new(
            vec![principal("admin@example.com", "Password123", Some("5512345678"))],
            "52",
        );
        let store = InMemoryChallengeStore::new();
        let manager = ChallengeManager::new(Arc::new(store.clone()), directory)
            .with_sender(DeliveryMethod::Whatsapp, Arc::new(RecordingSender::failing()));

        let err = manager
            .issue("admin@example.com", DeliveryMethod::Whatsapp, Some("5512345678"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DeliveryFailure(_)));
        assert_eq!(store.len().await, 0);
    }

    /// 投递途中同账号被重新签发，然后本次投递失败
    struct ReissueThenFail {
        store: InMemoryChallengeStore,
    }

    #[async_trait]
    impl MessageSender for ReissueThenFail {
        fn channel(&self) -> &'static str {
            "test"
        }

        async fn send_text(&self, _to: &str, _body: &str) -> AppResult<()> {
            self.store
                .insert(
                    "admin@example.com",
                    VerificationChallenge {
                        code: "NEWER1".to_string(),
                        expires_at: Utc::now() + Duration::minutes(5),
                        method: DeliveryMethod::Whatsapp,
                    },
                )
                .await?;
            Err(AppError::DeliveryFailure("timeout".to_string()))
        }
    }

    #[tokio::test]
    async fn test_failed_delivery_keeps_newer_challenge() {
        let directory = AdminDirectory::new(
            vec![principal("admin@example.com", "Password123", Some("5512345678"))],
            "52",
        );
        let store = InMemoryChallengeStore::new();
        let manager = ChallengeManager::new(Arc::new(store.clone()), directory).with_sender(
            DeliveryMethod::Whatsapp,
            Arc::new(ReissueThenFail {
                store: store.clone(),
            }),
        );

        let err = manager
            .issue("admin@example.com", DeliveryMethod::Whatsapp, Some("5512345678"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DeliveryFailure(_)));
        let kept = store.get("admin@example.com").await.unwrap().unwrap();
        assert_eq!(kept.code, "NEWER1");
    }

    #[tokio::test]
    async fn test_verify_is_single_use() {
        let f = fixture();
        f.manager
            .issue("admin@example.com", DeliveryMethod::Email, None)
            .await
            .unwrap();
        let code = f.email.last_code();

        f.manager.verify("admin@example.com", &code).await.unwrap();
        let err = f.manager.verify("admin@example.com", &code).await.unwrap_err();
        assert!(matches!(err, AppError::ChallengeNotFound));
    }

    #[tokio::test]
    async fn test_mismatch_keeps_challenge_for_retry() {
        let f = fixture();
        f.manager
            .issue("admin@example.com", DeliveryMethod::Email, None)
            .await
            .unwrap();
        let code = f.email.last_code();
        let wrong = if code == "000000" { "000001" } else { "000000" };

        let err = f.manager.verify("admin@example.com", wrong).await.unwrap_err();
        assert!(matches!(err, AppError::ChallengeMismatch));
        f.manager.verify("admin@example.com", &code).await.unwrap();
    }

    #[tokio::test]
    async fn test_expired_challenge_is_rejected_and_deleted() {
        let f = fixture();
        f.manager
            .issue("admin@example.com", DeliveryMethod::Email, None)
            .await
            .unwrap();
        let code = f.email.last_code();

        f.advance(CHALLENGE_TTL_SECS + 1);
        let err = f.manager.verify("admin@example.com", &code).await.unwrap_err();
        assert!(matches!(err, AppError::ChallengeExpired));
        let err = f.manager.verify("admin@example.com", &code).await.unwrap_err();
        assert!(matches!(err, AppError::ChallengeNotFound));
    }

    #[tokio::test]
    async fn test_valid_until_expiry_instant() {
        let f = fixture();
        f.manager
            .issue("admin@example.com", DeliveryMethod::Email, None)
            .await
            .unwrap();
        let code = f.email.last_code();

        f.advance(CHALLENGE_TTL_SECS);
        f.manager.verify("admin@example.com", &code).await.unwrap();
    }

    #[tokio::test]
    async fn test_reissue_overwrites_previous_code() {
        let f = fixture();
        f.store
            .insert(
                "admin@example.com",
                VerificationChallenge {
                    code: "111111".to_string(),
                    expires_at: Utc::now() + Duration::minutes(5),
                    method: DeliveryMethod::Email,
                },
            )
            .await
            .unwrap();
        f.manager
            .issue("admin@example.com", DeliveryMethod::Email, None)
            .await
            .unwrap();
        let code = f.email.last_code();

        assert_eq!(f.store.len().await, 1);
        assert_eq!(
            f.store.get("admin@example.com").await.unwrap().unwrap().code,
            code
        );
    }

    #[tokio::test]
    async fn test_concurrent_verify_succeeds_once() {
        let f = fixture();
        f.manager
            .issue("admin@example.com", DeliveryMethod::Email, None)
            .await
            .unwrap();
        let code = f.email.last_code();

        let attempts = (0..8).map(|_| {
            let manager = f.manager.clone();
            let code = code.clone();
            tokio::spawn(async move { manager.verify("admin@example.com", &code).await })
        });
        let results = futures_util::future::join_all(attempts).await;
        let successes = results
            .into_iter()
            .filter(|r| matches!(r, Ok(Ok(_))))
            .count();
        assert_eq!(successes, 1);
    }

    #[tokio::test]
    async fn test_verify_unknown_account() {
        let f = fixture();
        let err = f.manager.verify("ghost@example.com", "123456").await.unwrap_err();
        assert!(matches!(err, AppError::ChallengeNotFound));
    }

    #[test]
    fn test_codes_equal() {
        assert!(codes_equal("012345", "012345"));
        assert!(!codes_equal("012345", "012346"));
        assert!(!codes_equal("012345", "12345"));
    }
}
