use crate::error::{Result, UnisphereError};
use crate::{ApiClient, ApiResponse, KeyFilter, MetricsPayload};
use std::sync::Arc;
use tokio::sync::{Semaphore, SemaphorePermit};

/// Upper bound on concurrent requests to Unisphere across the whole process.
pub const MAX_CONCURRENT_REQUESTS: usize = 100;

/// Counting gate over upstream calls. A slot is held for as long as the
/// returned permit lives, so it is released on every exit path.
#[derive(Debug)]
pub struct RequestThrottle {
    semaphore: Semaphore,
    capacity: usize,
}

impl RequestThrottle {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Semaphore::new(capacity),
            capacity,
        }
    }

    /// Waits until a slot is free. Fails with
    /// [`UnisphereError::ThrottleClosed`] once the throttle is closed.
    pub async fn acquire(&self) -> Result<SemaphorePermit<'_>> {
        self.semaphore
            .acquire()
            .await
            .map_err(|_| UnisphereError::ThrottleClosed)
    }

    /// Stop admitting requests. Waiting and later callers fail; permits
    /// already held stay valid until dropped.
    pub fn close(&self) {
        self.semaphore.close();
    }

    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

impl Default for RequestThrottle {
    fn default() -> Self {
        Self::new(MAX_CONCURRENT_REQUESTS)
    }
}

/// [`ApiClient`] decorator that holds a throttle slot for the duration of
/// every call.
pub struct ThrottledClient {
    inner: Arc<dyn ApiClient>,
    throttle: Arc<RequestThrottle>,
}

impl ThrottledClient {
    pub fn new(inner: Arc<dyn ApiClient>, throttle: Arc<RequestThrottle>) -> Self {
        Self { inner, throttle }
    }
}

#[async_trait::async_trait]
impl ApiClient for ThrottledClient {
    async fn fetch_keys(&self, endpoint: &str, filter: &KeyFilter) -> Result<ApiResponse> {
        let _permit = self.throttle.acquire().await?;
        self.inner.fetch_keys(endpoint, filter).await
    }

    async fn fetch_metrics(
        &self,
        endpoint: &str,
        payload: &MetricsPayload,
    ) -> Result<ApiResponse> {
        let _permit = self.throttle.acquire().await?;
        self.inner.fetch_metrics(endpoint, payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Counts how many calls are in flight at once.
    #[derive(Default)]
    struct SlowClient {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl ApiClient for SlowClient {
        async fn fetch_keys(&self, _endpoint: &str, _filter: &KeyFilter) -> Result<ApiResponse> {
            Ok(ApiResponse::new(200, "{}"))
        }

        async fn fetch_metrics(
            &self,
            _endpoint: &str,
            _payload: &MetricsPayload,
        ) -> Result<ApiResponse> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            if self.fail {
                Err(UnisphereError::UnexpectedShape("boom".into()))
            } else {
                Ok(ApiResponse::new(204, Vec::new()))
            }
        }
    }

    fn payload() -> MetricsPayload {
        let instance = pmx_common::ResourceInstance::array("000197900123");
        MetricsPayload::for_instance(&instance, pmx_common::TimeRange::current())
    }

    #[tokio::test]
    async fn never_admits_more_than_capacity() {
        let inner = Arc::new(SlowClient::default());
        let throttle = Arc::new(RequestThrottle::new(3));
        let client = Arc::new(ThrottledClient::new(inner.clone(), throttle.clone()));

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..20 {
            let client = Arc::clone(&client);
            tasks.spawn(async move {
                client
                    .fetch_metrics("/performance/Array/metrics", &payload())
                    .await
            });
        }
        while let Some(res) = tasks.join_next().await {
            assert!(res.unwrap().is_ok());
        }

        assert_eq!(inner.peak.load(Ordering::SeqCst), 3);
        assert_eq!(throttle.available(), 3);
    }

    #[tokio::test]
    async fn permits_are_returned_when_calls_fail() {
        let inner = Arc::new(SlowClient {
            fail: true,
            ..Default::default()
        });
        let throttle = Arc::new(RequestThrottle::new(2));
        let client = ThrottledClient::new(inner, throttle.clone());

        for _ in 0..5 {
            let res = client
                .fetch_metrics("/performance/Array/metrics", &payload())
                .await;
            assert!(res.is_err());
        }
        assert_eq!(throttle.available(), throttle.capacity());
    }

    #[tokio::test]
    async fn closed_throttle_rejects_without_calling_upstream() {
        let inner = Arc::new(SlowClient::default());
        let throttle = Arc::new(RequestThrottle::new(2));
        let client = ThrottledClient::new(inner.clone(), throttle.clone());

        throttle.close();
        assert!(throttle.is_closed());
        let err = client
            .fetch_metrics("/performance/Array/metrics", &payload())
            .await
            .unwrap_err();
        assert!(matches!(err, UnisphereError::ThrottleClosed));
        assert_eq!(inner.peak.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn zero_capacity_is_clamped_to_one() {
        let throttle = RequestThrottle::new(0);
        assert_eq!(throttle.capacity(), 1);
        assert_eq!(RequestThrottle::default().capacity(), MAX_CONCURRENT_REQUESTS);
    }
}
