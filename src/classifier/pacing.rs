use futures::future::BoxFuture;
use std::time::Duration;

/// Source des délais, remplacée par une horloge factice dans les tests
pub trait Clock: Send + Sync {
    fn sleep(&self, duration: Duration) -> BoxFuture<'_, ()>;
}

/// Temps réel, via le timer tokio
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn sleep(&self, duration: Duration) -> BoxFuture<'_, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Espacement fixe entre deux appels de complétion consécutifs
#[derive(Debug, Clone)]
pub struct Pacer<K = TokioClock> {
    interval: Duration,
    clock: K,
}

impl Pacer<TokioClock> {
    pub fn fixed(interval: Duration) -> Self {
        Pacer::new(interval, TokioClock)
    }
}

impl<K: Clock> Pacer<K> {
    pub fn new(interval: Duration, clock: K) -> Self {
        Pacer { interval, clock }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Attend avant l'appel à la position `index` d'un lot.
    /// Le premier appel part immédiatement, donc rien n'est attendu après le dernier.
    pub async fn before_call(&self, index: usize) {
        if index == 0 || self.interval.is_zero() {
            return;
        }
        self.clock.sleep(self.interval).await;
    }
}
