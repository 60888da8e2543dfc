//! In-memory stand-ins for the external systems held in `AppState`.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use streamhub_core::models::CompletedPart;
use streamhub_services::{
    GatewayResult, GatewaySubscription, IdentityError, IdentityProvider, IdentityVerifier,
    JobStatus, Notifier, NotifyResult, PaymentGateway, PaymentIntent, PaymentIntentRequest,
    Refund, TranscodeError, TranscodeRequest, TranscodeResult, TranscodeService,
    VerifiedIdentity,
};
use streamhub_storage::{MultipartUpload, ObjectStorage, StorageError, StorageResult};
use uuid::Uuid;

pub const BUCKET_URL: &str = "https://media.streamhub.test";

/// Tracks open multipart uploads, deleted keys and keys signed for reading.
#[derive(Default)]
pub struct FakeStorage {
    open: Mutex<Vec<MultipartUpload>>,
    deleted: Mutex<Vec<String>>,
    completed: Mutex<Vec<String>>,
    signed: Mutex<Vec<String>>,
}

impl FakeStorage {
    pub fn deleted_keys(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn completed_keys(&self) -> Vec<String> {
        self.completed.lock().unwrap().clone()
    }

    pub fn signed_keys(&self) -> Vec<String> {
        self.signed.lock().unwrap().clone()
    }

    fn take_open(&self, key: &str, upload_id: &str) -> StorageResult<()> {
        let mut open = self.open.lock().unwrap();
        let before = open.len();
        open.retain(|u| !(u.key == key && u.upload_id == upload_id));
        if open.len() == before {
            return Err(StorageError::NotFound(format!("no upload {}", upload_id)));
        }
        Ok(())
    }
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn create_multipart(&self, key: &str, _content_type: &str) -> StorageResult<String> {
        let upload_id = format!("upload-{}", Uuid::new_v4().simple());
        self.open.lock().unwrap().push(MultipartUpload {
            key: key.to_string(),
            upload_id: upload_id.clone(),
        });
        Ok(upload_id)
    }

    async fn list_multipart_uploads(&self, prefix: &str) -> StorageResult<Vec<MultipartUpload>> {
        Ok(self
            .open
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.key.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn presign_upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        _expires_in: Duration,
    ) -> StorageResult<String> {
        Ok(format!(
            "{}/{}?uploadId={}&partNumber={}",
            BUCKET_URL, key, upload_id, part_number
        ))
    }

    async fn complete_multipart(
        &self,
        key: &str,
        upload_id: &str,
        _parts: &[CompletedPart],
    ) -> StorageResult<()> {
        self.take_open(key, upload_id)?;
        self.completed.lock().unwrap().push(key.to_string());
        Ok(())
    }

    async fn abort_multipart(&self, key: &str, upload_id: &str) -> StorageResult<()> {
        self.take_open(key, upload_id)
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        self.signed.lock().unwrap().push(key.to_string());
        Ok(format!("{}/{}?expires={}", BUCKET_URL, key, expires_in.as_secs()))
    }

    async fn presign_put(
        &self,
        key: &str,
        _content_type: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        Ok(format!("{}/{}?put&expires={}", BUCKET_URL, key, expires_in.as_secs()))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.deleted.lock().unwrap().push(key.to_string());
        Ok(())
    }

    fn bucket_url(&self) -> &str {
        BUCKET_URL
    }
}

/// Reports whatever status the test sets; counts submissions and status polls.
pub struct FakeTranscoder {
    status: Mutex<JobStatus>,
    reject_submissions: AtomicBool,
    submitted: AtomicUsize,
    polled: AtomicUsize,
}

impl Default for FakeTranscoder {
    fn default() -> Self {
        Self {
            status: Mutex::new(JobStatus::Progressing),
            reject_submissions: AtomicBool::new(false),
            submitted: AtomicUsize::new(0),
            polled: AtomicUsize::new(0),
        }
    }
}

impl FakeTranscoder {
    pub fn set_status(&self, status: JobStatus) {
        *self.status.lock().unwrap() = status;
    }

    pub fn reject_submissions(&self) {
        self.reject_submissions.store(true, Ordering::SeqCst);
    }

    pub fn submitted(&self) -> usize {
        self.submitted.load(Ordering::SeqCst)
    }

    pub fn polled(&self) -> usize {
        self.polled.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranscodeService for FakeTranscoder {
    async fn submit_job(&self, request: &TranscodeRequest) -> TranscodeResult<String> {
        if self.reject_submissions.load(Ordering::SeqCst) {
            return Err(TranscodeError::SubmitFailed("queue unavailable".to_string()));
        }
        self.submitted.fetch_add(1, Ordering::SeqCst);
        Ok(format!("job-{}", request.media_id.simple()))
    }

    async fn job_status(&self, _job_id: &str) -> TranscodeResult<JobStatus> {
        self.polled.fetch_add(1, Ordering::SeqCst);
        Ok(*self.status.lock().unwrap())
    }
}

/// Accepts everything and hands out fresh gateway ids.
#[derive(Default)]
pub struct FakeGateway {
    intents: Mutex<Vec<PaymentIntent>>,
    refunds: AtomicUsize,
    canceled: Mutex<Vec<String>>,
}

impl FakeGateway {
    pub fn last_intent(&self) -> Option<PaymentIntent> {
        self.intents.lock().unwrap().last().cloned()
    }

    pub fn refunds(&self) -> usize {
        self.refunds.load(Ordering::SeqCst)
    }

    pub fn canceled_subscriptions(&self) -> Vec<String> {
        self.canceled.lock().unwrap().clone()
    }

    fn new_intent(&self, amount: i64, currency: &str) -> PaymentIntent {
        let id = format!("pi_{}", Uuid::new_v4().simple());
        let intent = PaymentIntent {
            client_secret: Some(format!("{}_secret", id)),
            id,
            status: "requires_payment_method".to_string(),
            amount,
            currency: currency.to_string(),
            payment_method_type: Some("card".to_string()),
        };
        self.intents.lock().unwrap().push(intent.clone());
        intent
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn find_customer_by_email(&self, _email: &str) -> GatewayResult<Option<String>> {
        Ok(None)
    }

    async fn create_customer(&self, _email: &str, _name: &str) -> GatewayResult<String> {
        Ok(format!("cus_{}", Uuid::new_v4().simple()))
    }

    async fn create_payment_intent(
        &self,
        request: &PaymentIntentRequest,
    ) -> GatewayResult<PaymentIntent> {
        Ok(self.new_intent(request.amount_minor, &request.currency))
    }

    async fn create_subscription(
        &self,
        _customer_id: &str,
        _price_id: &str,
    ) -> GatewayResult<GatewaySubscription> {
        Ok(GatewaySubscription {
            id: format!("sub_{}", Uuid::new_v4().simple()),
            status: "incomplete".to_string(),
            latest_payment: Some(self.new_intent(999, "usd")),
        })
    }

    async fn change_subscription_price(
        &self,
        subscription_id: &str,
        _price_id: &str,
    ) -> GatewayResult<GatewaySubscription> {
        Ok(GatewaySubscription {
            id: subscription_id.to_string(),
            status: "active".to_string(),
            latest_payment: Some(self.new_intent(500, "usd")),
        })
    }

    async fn cancel_subscription(&self, subscription_id: &str) -> GatewayResult<()> {
        self.canceled
            .lock()
            .unwrap()
            .push(subscription_id.to_string());
        Ok(())
    }

    async fn create_refund(&self, _payment_intent_id: &str) -> GatewayResult<Refund> {
        self.refunds.fetch_add(1, Ordering::SeqCst);
        Ok(Refund {
            id: format!("re_{}", Uuid::new_v4().simple()),
            status: "pending".to_string(),
        })
    }
}

/// Keeps every outbound message so tests can read the codes back.
#[derive(Default)]
pub struct RecordingNotifier {
    emails: Mutex<Vec<(String, String)>>,
    sms: Mutex<Vec<(String, String)>>,
}

/// First run of six digits in a message body.
fn extract_code(body: &str) -> Option<String> {
    body.as_bytes()
        .windows(6)
        .find(|w| w.iter().all(u8::is_ascii_digit))
        .map(|w| String::from_utf8_lossy(w).into_owned())
}

impl RecordingNotifier {
    pub fn latest_email_code(&self, to: &str) -> Option<String> {
        self.emails
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(recipient, _)| recipient == to)
            .and_then(|(_, body)| extract_code(body))
    }

    pub fn latest_sms_code(&self, to: &str) -> Option<String> {
        self.sms
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(recipient, _)| recipient == to)
            .and_then(|(_, body)| extract_code(body))
    }

    pub fn email_count(&self) -> usize {
        self.emails.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_email(&self, to: &str, _subject: &str, body: &str) -> NotifyResult<()> {
        self.emails
            .lock()
            .unwrap()
            .push((to.to_string(), body.to_string()));
        Ok(())
    }

    async fn send_sms(&self, to: &str, body: &str) -> NotifyResult<()> {
        self.sms
            .lock()
            .unwrap()
            .push((to.to_string(), body.to_string()));
        Ok(())
    }
}

/// Treats the id token as the account email; `invalid` is rejected.
pub struct FakeIdentity;

#[async_trait]
impl IdentityVerifier for FakeIdentity {
    async fn verify(
        &self,
        provider: IdentityProvider,
        id_token: &str,
    ) -> Result<VerifiedIdentity, IdentityError> {
        if id_token == "invalid" {
            return Err(IdentityError::InvalidToken("signature mismatch".to_string()));
        }
        Ok(VerifiedIdentity {
            subject: format!("{}-{}", provider.name(), id_token),
            email: Some(id_token.to_string()),
            email_verified: true,
            given_name: Some("Test".to_string()),
            family_name: Some("Viewer".to_string()),
            picture: None,
        })
    }
}
