#[cfg(test)]
mod tests {
    use lru_tracker::libs::error::UpdateError;
    use lru_tracker::libs::guard::OperationGuard;
    use lru_tracker::libs::hasher::digest_bytes;
    use lru_tracker::libs::http::TransportPolicy;
    use lru_tracker::libs::update::{UpdateCheck, UpdateClient, UpdatePayload, UpdateTier};
    use serde_json::json;
    use test_context::{test_context, AsyncTestContext};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct UpdateServerContext {
        server: MockServer,
    }

    impl AsyncTestContext for UpdateServerContext {
        async fn setup() -> Self {
            UpdateServerContext {
                server: MockServer::start().await,
            }
        }
    }

    impl UpdateServerContext {
        fn client(&self) -> UpdateClient {
            UpdateClient::new(
                &format!("{}/update_manifest.json", self.server.uri()),
                &format!("{}/version.json", self.server.uri()),
                TransportPolicy::AllowLoopback,
            )
        }

        async fn serve_manifest(&self, version: &str) {
            let body = json!({
                "version": version,
                "release_notes": "Faster station list",
                "files": {"lru_tracker.py": {"size": 3, "sha256": digest_bytes(b"abc")}}
            });
            Mock::given(method("GET"))
                .and(path("/update_manifest.json"))
                .respond_with(ResponseTemplate::new(200).set_body_json(body))
                .mount(&self.server)
                .await;
        }

        async fn serve_descriptor(&self, version: &str, expected_calls: u64) {
            let body = json!({
                "version": version,
                "download_url": "https://example.com/LRU_Tracker.exe",
                "size_mb": 127.0
            });
            Mock::given(method("GET"))
                .and(path("/version.json"))
                .respond_with(ResponseTemplate::new(200).set_body_json(body))
                .expect(expected_calls)
                .mount(&self.server)
                .await;
        }
    }

    #[test_context(UpdateServerContext)]
    #[tokio::test]
    async fn test_incremental_manifest_wins(ctx: &mut UpdateServerContext) {
        ctx.serve_manifest("1.3.0").await;
        ctx.serve_descriptor("1.4.0", 0).await;

        let info = ctx.client().check_for_updates("1.2.8").await.unwrap().unwrap();
        assert_eq!(info.version.to_string(), "1.3.0");
        assert_eq!(info.tier(), UpdateTier::Incremental);
        assert_eq!(info.release_notes, "Faster station list");
    }

    #[test_context(UpdateServerContext)]
    #[tokio::test]
    async fn test_well_formed_manifest_is_authoritative(ctx: &mut UpdateServerContext) {
        ctx.serve_manifest("1.2.8").await;
        ctx.serve_descriptor("9.9.9", 0).await;

        assert_eq!(ctx.client().check_for_updates("1.2.8").await.unwrap(), None);
    }

    #[test_context(UpdateServerContext)]
    #[tokio::test]
    async fn test_missing_manifest_falls_back_to_descriptor(ctx: &mut UpdateServerContext) {
        Mock::given(method("GET"))
            .and(path("/update_manifest.json"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&ctx.server)
            .await;
        ctx.serve_descriptor("1.3.0", 1).await;

        let info = ctx.client().check_for_updates("1.2.8").await.unwrap().unwrap();
        assert_eq!(info.tier(), UpdateTier::SingleFile);
        match info.payload {
            UpdatePayload::SingleFile { download_url, size_mb } => {
                assert_eq!(download_url, "https://example.com/LRU_Tracker.exe");
                assert_eq!(size_mb, Some(127.0));
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test_context(UpdateServerContext)]
    #[tokio::test]
    async fn test_malformed_manifest_falls_back_to_descriptor(ctx: &mut UpdateServerContext) {
        Mock::given(method("GET"))
            .and(path("/update_manifest.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"version\": \"1.3\"}"))
            .mount(&ctx.server)
            .await;
        ctx.serve_descriptor("1.2.8", 1).await;

        assert_eq!(ctx.client().check_for_updates("1.2.8").await.unwrap(), None);
    }

    #[test_context(UpdateServerContext)]
    #[tokio::test]
    async fn test_unparseable_manifest_yields_single_file_update(ctx: &mut UpdateServerContext) {
        Mock::given(method("GET"))
            .and(path("/update_manifest.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>502 Bad Gateway</html>"))
            .mount(&ctx.server)
            .await;
        ctx.serve_descriptor("1.3.0", 1).await;

        let info = ctx.client().check_for_updates("1.2.8").await.unwrap().unwrap();
        assert_eq!(info.version.to_string(), "1.3.0");
        assert_eq!(info.tier(), UpdateTier::SingleFile);
        assert!(matches!(info.payload, UpdatePayload::SingleFile { .. }));
    }

    #[test_context(UpdateServerContext)]
    #[tokio::test]
    async fn test_redirect_to_plaintext_host_is_refused(ctx: &mut UpdateServerContext) {
        let port = ctx.server.address().port();
        Mock::given(method("GET"))
            .and(path("/update_manifest.json"))
            .respond_with(
                ResponseTemplate::new(302).insert_header("Location", format!("http://127.0.0.2:{}/update_manifest.json", port)),
            )
            .mount(&ctx.server)
            .await;
        ctx.serve_descriptor("9.9.9", 0).await;

        let result = ctx.client().check_for_updates("1.2.8").await;
        match result {
            Err(UpdateError::InsecureTransport(target)) => assert!(target.starts_with("http://127.0.0.2")),
            other => panic!("expected a refused redirect, got {:?}", other),
        }
    }

    #[test_context(UpdateServerContext)]
    #[tokio::test]
    async fn test_redirect_within_policy_is_followed(ctx: &mut UpdateServerContext) {
        Mock::given(method("GET"))
            .and(path("/update_manifest.json"))
            .respond_with(ResponseTemplate::new(301).insert_header("Location", format!("{}/releases/update_manifest.json", ctx.server.uri())))
            .mount(&ctx.server)
            .await;
        Mock::given(method("GET"))
            .and(path("/releases/update_manifest.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "version": "1.3.0",
                "files": {"lru_tracker.py": {"size": 3, "sha256": digest_bytes(b"abc")}}
            })))
            .mount(&ctx.server)
            .await;

        let info = ctx.client().check_for_updates("1.2.8").await.unwrap().unwrap();
        assert_eq!(info.tier(), UpdateTier::Incremental);
    }

    #[test_context(UpdateServerContext)]
    #[tokio::test]
    async fn test_no_update_when_current_is_newer(ctx: &mut UpdateServerContext) {
        ctx.serve_manifest("1.2.8").await;

        assert_eq!(ctx.client().check_for_updates("1.10.0").await.unwrap(), None);
    }

    #[test_context(UpdateServerContext)]
    #[tokio::test]
    async fn test_malformed_current_version_means_up_to_date(ctx: &mut UpdateServerContext) {
        ctx.serve_manifest("1.3.0").await;

        assert_eq!(ctx.client().check_for_updates("dev").await.unwrap(), None);
    }

    #[test_context(UpdateServerContext)]
    #[tokio::test]
    async fn test_malformed_descriptor_is_bad_data(ctx: &mut UpdateServerContext) {
        Mock::given(method("GET"))
            .and(path("/version.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"version": "1.3.0"})))
            .mount(&ctx.server)
            .await;

        let result = ctx.client().check_for_updates("1.2.8").await;
        assert!(matches!(result, Err(UpdateError::MalformedUpdateData(_))));
        assert!(matches!(UpdateCheck::from_result(result), UpdateCheck::BadServerData(_)));
    }

    #[test_context(UpdateServerContext)]
    #[tokio::test]
    async fn test_server_errors_are_network_failures(ctx: &mut UpdateServerContext) {
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&ctx.server)
            .await;

        let result = ctx.client().check_for_updates("1.2.8").await;
        assert!(result.as_ref().is_err_and(|e| e.is_network()));
        assert!(matches!(UpdateCheck::from_result(result), UpdateCheck::Offline(_)));
    }

    #[test_context(UpdateServerContext)]
    #[tokio::test]
    async fn test_plain_http_is_refused_before_any_request(ctx: &mut UpdateServerContext) {
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&ctx.server)
            .await;

        let strict = UpdateClient::new(
            &format!("{}/update_manifest.json", ctx.server.uri()),
            &format!("{}/version.json", ctx.server.uri()),
            TransportPolicy::HttpsOnly,
        );
        let result = strict.check_for_updates("1.2.8").await;
        assert!(matches!(result, Err(UpdateError::InsecureTransport(_))));

        let remote_http = UpdateClient::new(
            "https://example.com/update_manifest.json",
            "http://example.com/version.json",
            TransportPolicy::AllowLoopback,
        );
        assert!(matches!(
            remote_http.check_for_updates("1.2.8").await,
            Err(UpdateError::InsecureTransport(_))
        ));
    }

    #[test_context(UpdateServerContext)]
    #[tokio::test]
    async fn test_concurrent_check_is_busy(ctx: &mut UpdateServerContext) {
        ctx.serve_manifest("1.3.0").await;
        let guard = OperationGuard::new();
        let _install = guard.try_acquire("install").unwrap();

        let result = ctx.client().with_guard(guard.clone()).check_for_updates("1.2.8").await;
        assert!(matches!(result, Err(UpdateError::Busy(ref op)) if op == "install"));
    }
}
