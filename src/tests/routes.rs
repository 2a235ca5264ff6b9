use http::Method;

use crate::{
    app::route::{MethodFilter, RoutePattern},
    errors::{GantryError, RouteError},
};

#[test]
fn test_method_filter_is_case_insensitive() -> Result<(), GantryError> {
    assert_eq!(MethodFilter::parse("GeT")?, MethodFilter::Only(Method::GET));
    assert_eq!(MethodFilter::parse("post")?, MethodFilter::Only(Method::POST));
    assert_eq!(MethodFilter::parse("ALL")?, MethodFilter::Any);
    Ok(())
}

#[test]
fn test_method_filter_rejects_garbage() {
    assert_eq!(
        MethodFilter::parse("GE T").err(),
        Some(GantryError::Route(RouteError::InvalidMethod("GE T".to_string())))
    );
}

#[test]
fn test_get_route_answers_head() -> Result<(), GantryError> {
    let filter = MethodFilter::parse("get")?;
    assert!(filter.allows(&Method::HEAD));
    assert!(!filter.allows(&Method::POST));
    Ok(())
}

#[test]
fn test_params_and_trailing_slash() -> Result<(), GantryError> {
    let pattern = RoutePattern::parse("/users/:id/Files")?;

    let params = pattern
        .matches("/users/42/files/")
        .expect("pattern should match");
    assert_eq!(params.get("id"), Some(&"42".to_string()));

    assert!(pattern
        .matches("/users/42")
        .is_none());
    assert!(pattern
        .matches("/users/42/files/extra")
        .is_none());
    Ok(())
}

#[test]
fn test_wildcard_captures_remainder() -> Result<(), GantryError> {
    let pattern = RoutePattern::parse("/static/*")?;
    let params = pattern
        .matches("/static/css/site.css")
        .expect("pattern should match");
    assert_eq!(params.get("*"), Some(&"css/site.css".to_string()));

    assert!(RoutePattern::parse("/a/*/b").is_err());
    Ok(())
}

#[test]
fn test_prefix_match() -> Result<(), GantryError> {
    let pattern = RoutePattern::parse("/api")?;
    assert!(pattern
        .matches_prefix("/api/users")
        .is_some());
    assert!(pattern
        .matches_prefix("/apiary")
        .is_none());
    assert!(RoutePattern::parse("/")?
        .matches_prefix("/anything")
        .is_some());
    Ok(())
}

#[test]
fn test_invalid_patterns() {
    assert!(RoutePattern::parse("").is_err());
    assert!(RoutePattern::parse("users").is_err());
    assert!(RoutePattern::parse("/users/:").is_err());
}

#[test]
fn test_params_are_percent_decoded() -> Result<(), GantryError> {
    let pattern = RoutePattern::parse("/u/:name")?;
    let params = pattern
        .matches("/u/J%C3%B6rg%20X")
        .expect("pattern should match");
    assert_eq!(params.get("name"), Some(&"Jörg X".to_string()));

    // a plus sign is literal in a path
    let params = pattern
        .matches("/u/a+b")
        .expect("pattern should match");
    assert_eq!(params.get("name"), Some(&"a+b".to_string()));

    let params = RoutePattern::parse("/files/*")?
        .matches("/files/my%20docs/a%2Fb.txt")
        .expect("pattern should match");
    assert_eq!(params.get("*"), Some(&"my docs/a/b.txt".to_string()));
    Ok(())
}
