mod app_tests {
    use std::{
        error::Error,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
    };

    use bytes::Bytes;
    use http::{header, HeaderValue, Method, StatusCode};
    use http_body_util::{BodyExt, Full};
    use serde_json::json;

    use crate::{
        app::{
            error_middleware_fn, middleware_fn, App, FileViewEngine, Layer, MethodFilter,
            JSON_SPACES_SETTING, POWERED_BY_SETTING, VIEWS_SETTING,
        },
        errors::GantryError,
        POWERED_BY,
    };

    fn request(method: Method, uri: &str) -> http::Request<Bytes> {
        let mut request = http::Request::new(Bytes::new());
        *request.method_mut() = method;
        *request.uri_mut() = uri
            .parse()
            .unwrap();
        request
    }

    async fn body_of(response: http::Response<Full<Bytes>>) -> Result<String, Box<dyn Error>> {
        let bytes = response
            .into_body()
            .collect()
            .await?
            .to_bytes();
        Ok(String::from_utf8(bytes.to_vec())?)
    }

    #[tokio::test]
    async fn test_route_with_params() -> Result<(), Box<dyn Error>> {
        let app = App::new();
        app.route(
            MethodFilter::parse("get")?,
            "/users/:id",
            middleware_fn(|request, response, _next| async move {
                let id = request
                    .param("id")
                    .unwrap_or_default()
                    .to_string();
                let _ = response.send(format!("user {}", id));
            }),
        )?;

        let response = app
            .handle(request(Method::GET, "/users/42?verbose=1"))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(header::CONTENT_TYPE),
            Some(&HeaderValue::from_static("text/html; charset=utf-8"))
        );
        assert_eq!(body_of(response).await?, "user 42");

        Ok(())
    }

    #[tokio::test]
    async fn test_route_params_are_decoded() -> Result<(), Box<dyn Error>> {
        let app = App::new();
        app.route(
            MethodFilter::parse("get")?,
            "/u/:name",
            middleware_fn(|request, response, _next| async move {
                let name = request
                    .param("name")
                    .unwrap_or_default()
                    .to_string();
                let _ = response.send(name);
            }),
        )?;

        let response = app
            .handle(request(Method::GET, "/u/J%C3%B6rg%20X"))
            .await;

        assert_eq!(body_of(response).await?, "Jörg X");

        Ok(())
    }

    #[tokio::test]
    async fn test_unmatched_request_is_404() -> Result<(), Box<dyn Error>> {
        let app = App::new();
        app.route(
            MethodFilter::parse("post")?,
            "/users",
            middleware_fn(|_request, response, _next| async move {
                let _ = response.send("created");
            }),
        )?;

        let response = app
            .handle(request(Method::GET, "/users"))
            .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_of(response).await?, "Cannot GET /users");

        Ok(())
    }

    #[tokio::test]
    async fn test_middleware_runs_in_order() -> Result<(), Box<dyn Error>> {
        let app = App::new();
        app.use_middleware(middleware_fn(|_request, response, next| async move {
            response.set_header("x-trace", HeaderValue::from_static("first"));
            next.proceed();
        }));
        app.use_middleware(middleware_fn(|_request, response, next| async move {
            response.append_header("x-trace", HeaderValue::from_static("second"));
            next.proceed();
        }));
        app.route(
            MethodFilter::Any,
            "/",
            middleware_fn(|_request, response, _next| async move {
                let _ = response.send("done");
            }),
        )?;

        let response = app
            .handle(request(Method::DELETE, "/"))
            .await;

        let trace: Vec<&str> = response
            .headers()
            .get_all("x-trace")
            .iter()
            .filter_map(|value| {
                value
                    .to_str()
                    .ok()
            })
            .collect();
        assert_eq!(trace, vec!["first", "second"]);
        assert_eq!(body_of(response).await?, "done");

        Ok(())
    }

    #[tokio::test]
    async fn test_error_middleware_receives_failure() -> Result<(), Box<dyn Error>> {
        let app = App::new();
        let skipped = Arc::new(AtomicUsize::new(0));

        app.use_error({
            let skipped = skipped.clone();
            error_middleware_fn(move |error, _request, _response, next| {
                let skipped = skipped.clone();
                async move {
                    skipped.fetch_add(1, Ordering::SeqCst);
                    next.fail(error);
                }
            })
        });
        app.route(
            MethodFilter::parse("get")?,
            "/tea",
            middleware_fn(|_request, _response, next| async move {
                next.fail(GantryError::Http(StatusCode::IM_A_TEAPOT, "short and stout".to_string()));
            }),
        )?;
        app.route(
            MethodFilter::parse("get")?,
            "/tea",
            middleware_fn(|_request, response, _next| async move {
                let _ = response.send("never reached");
            }),
        )?;
        app.use_error(error_middleware_fn(|error, _request, response, _next| async move {
            response.status(error.status());
            let _ = response.send(format!("handled: {}", error));
        }));

        let response = app
            .handle(request(Method::GET, "/tea"))
            .await;

        assert_eq!(response.status(), StatusCode::IM_A_TEAPOT);
        assert_eq!(body_of(response).await?, "handled: short and stout");
        // registered before the failing route, so it never sees the error
        assert_eq!(skipped.load(Ordering::SeqCst), 0);

        Ok(())
    }

    #[tokio::test]
    async fn test_unhandled_errors_use_their_status() -> Result<(), Box<dyn Error>> {
        let app = App::new();
        app.route(
            MethodFilter::parse("get")?,
            "/missing",
            middleware_fn(|_request, _response, next| async move {
                next.fail(GantryError::Http(StatusCode::NOT_FOUND, "No such user".to_string()));
            }),
        )?;
        app.route(
            MethodFilter::parse("get")?,
            "/broken",
            middleware_fn(|_request, _response, next| async move {
                next.fail(GantryError::Handler("database is down".to_string()));
            }),
        )?;

        let response = app
            .handle(request(Method::GET, "/missing"))
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_of(response).await?, "No such user");

        let response = app
            .handle(request(Method::GET, "/broken"))
            .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_of(response).await?, "Internal Server Error");

        Ok(())
    }

    #[tokio::test]
    async fn test_panicking_handler_becomes_error() -> Result<(), Box<dyn Error>> {
        let app = App::new();
        let seen = Arc::new(std::sync::Mutex::new(None));

        app.route(
            MethodFilter::parse("get")?,
            "/panic",
            middleware_fn(|_request, _response, _next| async move {
                panic!("boom");
            }),
        )?;
        app.use_error({
            let seen = seen.clone();
            error_middleware_fn(move |error, _request, _response, next| {
                let seen = seen.clone();
                async move {
                    *seen
                        .lock()
                        .unwrap() = Some(error.clone());
                    next.fail(error);
                }
            })
        });

        let response = app
            .handle(request(Method::GET, "/panic"))
            .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            *seen
                .lock()
                .unwrap(),
            Some(GantryError::Handler("Handler panicked: boom".to_string()))
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_mounted_middleware() -> Result<(), Box<dyn Error>> {
        let app = App::new();
        app.use_layer(
            Layer::middleware(middleware_fn(|_request, response, _next| async move {
                response.status(StatusCode::UNAUTHORIZED);
                let _ = response.send("denied");
            }))
            .mount("/admin")?,
        );
        app.route(
            MethodFilter::parse("get")?,
            "/*",
            middleware_fn(|request, response, _next| async move {
                let _ = response.send(request.path());
            }),
        )?;

        let response = app
            .handle(request(Method::GET, "/admin/users"))
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_of(response).await?, "denied");

        let response = app
            .handle(request(Method::GET, "/public/index"))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_of(response).await?, "/public/index");

        Ok(())
    }

    #[tokio::test]
    async fn test_halted_request_without_response() -> Result<(), Box<dyn Error>> {
        let app = App::new();
        app.use_middleware(middleware_fn(|_request, response, _next| async move {
            response.status(StatusCode::ACCEPTED);
        }));

        let response = app
            .handle(request(Method::GET, "/anything"))
            .await;

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(body_of(response).await?, "");

        Ok(())
    }

    #[tokio::test]
    async fn test_powered_by_header() -> Result<(), Box<dyn Error>> {
        let app = App::new();

        let response = app
            .handle(request(Method::GET, "/"))
            .await;
        assert_eq!(
            response
                .headers()
                .get("x-powered-by"),
            Some(&HeaderValue::from_static(POWERED_BY))
        );

        app.set(POWERED_BY_SETTING, false);
        assert!(!app.enabled(POWERED_BY_SETTING));

        let response = app
            .handle(request(Method::GET, "/"))
            .await;
        assert!(response
            .headers()
            .get("x-powered-by")
            .is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_head_request_has_no_body() -> Result<(), Box<dyn Error>> {
        let app = App::new();
        app.route(
            MethodFilter::parse("get")?,
            "/",
            middleware_fn(|_request, response, _next| async move {
                let _ = response.send("hello");
            }),
        )?;

        let response = app
            .handle(request(Method::HEAD, "/"))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(header::CONTENT_LENGTH),
            Some(&HeaderValue::from(5usize))
        );
        assert_eq!(body_of(response).await?, "");

        Ok(())
    }

    #[tokio::test]
    async fn test_json_spaces_setting() -> Result<(), Box<dyn Error>> {
        let app = App::new();
        app.set(JSON_SPACES_SETTING, 2);
        app.route(
            MethodFilter::parse("get")?,
            "/data",
            middleware_fn(|_request, response, _next| async move {
                let _ = response.json(&json!({ "a": 1 }));
            }),
        )?;

        let response = app
            .handle(request(Method::GET, "/data"))
            .await;

        assert_eq!(
            response
                .headers()
                .get(header::CONTENT_TYPE),
            Some(&HeaderValue::from_static("application/json; charset=utf-8"))
        );
        assert_eq!(body_of(response).await?, "{\n  \"a\": 1\n}");

        Ok(())
    }

    #[tokio::test]
    async fn test_json_spaces_are_capped() -> Result<(), Box<dyn Error>> {
        let app = App::new();
        app.set(JSON_SPACES_SETTING, u64::MAX);
        app.route(
            MethodFilter::parse("get")?,
            "/data",
            middleware_fn(|_request, response, _next| async move {
                let _ = response.json(&json!({ "a": 1 }));
            }),
        )?;

        let response = app
            .handle(request(Method::GET, "/data"))
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_of(response).await?, format!("{{\n{}\"a\": 1\n}}", " ".repeat(10)));

        Ok(())
    }

    #[tokio::test]
    async fn test_second_send_fails() -> Result<(), Box<dyn Error>> {
        let app = App::new();
        let second = Arc::new(std::sync::Mutex::new(None));
        app.route(
            MethodFilter::parse("get")?,
            "/",
            middleware_fn({
                let second = second.clone();
                move |_request, response, _next| {
                    let second = second.clone();
                    async move {
                        let _ = response.send("first");
                        *second
                            .lock()
                            .unwrap() = Some(response.send("second"));
                    }
                }
            }),
        )?;

        let response = app
            .handle(request(Method::GET, "/"))
            .await;

        assert_eq!(body_of(response).await?, "first");
        assert_eq!(
            *second
                .lock()
                .unwrap(),
            Some(Err(GantryError::HeadersSent))
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_render_with_file_view_engine() -> Result<(), Box<dyn Error>> {
        let dir = tempfile::tempdir()?;
        std::fs::write(
            dir.path()
                .join("greeting.html"),
            "<p>Hello {{ user.name }}{{ missing }}!</p>",
        )?;

        let app = App::new();
        app.set(
            VIEWS_SETTING,
            dir.path()
                .to_string_lossy()
                .to_string(),
        );
        app.engine(Arc::new(FileViewEngine::default()));
        app.route(
            MethodFilter::parse("get")?,
            "/",
            middleware_fn(|_request, response, next| async move {
                if let Err(error) =
                    response.render("greeting", &json!({ "user": { "name": "<Ada>" } }))
                {
                    next.fail(error);
                }
            }),
        )?;
        app.route(
            MethodFilter::parse("get")?,
            "/escape",
            middleware_fn(|_request, response, next| async move {
                if let Err(error) = response.render("../greeting", &json!({})) {
                    next.fail(error);
                }
            }),
        )?;

        let response = app
            .handle(request(Method::GET, "/"))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_of(response).await?, "<p>Hello &lt;Ada&gt;!</p>");

        let response = app
            .handle(request(Method::GET, "/escape"))
            .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        Ok(())
    }

    #[tokio::test]
    async fn test_settings_and_layers_are_shared_between_clones() -> Result<(), Box<dyn Error>> {
        let app = App::new();
        let clone = app.clone();

        clone.set("title", "gantry");
        clone.use_middleware(middleware_fn(|_request, _response, next| async move {
            next.proceed();
        }));

        assert!(app.same_instance(&clone));
        assert!(!app.same_instance(&App::new()));
        assert_eq!(app.setting("title"), Some(json!("gantry")));
        assert_eq!(app.layer_count(), 1);

        Ok(())
    }
}
