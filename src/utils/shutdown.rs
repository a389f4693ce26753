use tokio::sync::watch;

/// Creates the shutdown channel shared by every long-running task.
///
/// Sending `true` asks all holders of a receiver to stop.
pub fn channel() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    watch::channel(false)
}

/// Resolves once the shutdown flag is set.
///
/// A dropped sender never resolves, so tasks keep running until asked to stop.
pub async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_resolves_when_flag_already_set() {
        let (tx, mut rx) = channel();
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_millis(100), wait_for_shutdown(&mut rx))
            .await
            .expect("should resolve immediately");
    }

    #[tokio::test]
    async fn test_dropped_sender_does_not_resolve() {
        let (tx, mut rx) = channel();
        drop(tx);
        let res =
            tokio::time::timeout(Duration::from_millis(50), wait_for_shutdown(&mut rx)).await;
        assert!(res.is_err());
    }
}
