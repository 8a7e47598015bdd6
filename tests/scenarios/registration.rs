use rstest::rstest;
use schemeshell::{
    BUILTIN_SCHEMES, NetworkError, ProtocolRequest, RegistrationError, Responder, ResponseKind,
    SchemeMode,
};

use crate::local_router;

fn noop(_: &ProtocolRequest, _: Responder) {}

#[test]
fn registered_scheme_is_handled() {
    let router = local_router();
    assert!(!router.is_handled("atom"));

    router.register("atom", ResponseKind::String, noop).expect("register");

    assert!(router.is_handled("atom"));
    assert!(router.is_registered("atom"));
    assert!(!router.is_intercepted("atom"));
    assert_eq!(router.registered_schemes(), vec!["atom".to_string()]);
}

#[test]
fn duplicate_registration_fails() {
    let router = local_router();
    router.register("atom", ResponseKind::String, noop).expect("first");

    let err = router
        .register("atom", ResponseKind::String, noop)
        .expect_err("second registration");
    assert_eq!(err, RegistrationError::AlreadyRegistered("atom".to_string()));

    let err = router
        .register("atom", ResponseKind::Buffer, noop)
        .expect_err("registration under another kind");
    assert_eq!(err, RegistrationError::AlreadyRegistered("atom".to_string()));
}

#[test]
fn duplicate_intercept_fails() {
    let router = local_router();
    router.intercept("http", ResponseKind::String, noop).expect("first");

    let err = router
        .intercept("http", ResponseKind::String, noop)
        .expect_err("second intercept");
    assert_eq!(err, RegistrationError::AlreadyIntercepted("http".to_string()));
}

#[test]
fn removing_unknown_schemes_reports_not_found() {
    let router = local_router();
    assert_eq!(
        router.unregister("atom"),
        Err(RegistrationError::NotFound("atom".to_string(), SchemeMode::Registered))
    );
    assert_eq!(
        router.unintercept("atom"),
        Err(RegistrationError::NotFound("atom".to_string(), SchemeMode::Intercepted))
    );
}

#[rstest]
#[case("")]
#[case("1abc")]
#[case("has space")]
#[case("atom:")]
fn malformed_schemes_are_rejected(#[case] scheme: &str) {
    let router = local_router();
    assert!(matches!(
        router.register(scheme, ResponseKind::String, noop),
        Err(RegistrationError::InvalidScheme(_))
    ));
}

#[test]
fn builtin_schemes_are_handled_without_registration() {
    let router = local_router();
    for scheme in BUILTIN_SCHEMES {
        assert!(router.is_handled(scheme), "{scheme} should be handled");
    }
}

#[test]
fn schemes_compare_case_insensitively() {
    let router = local_router();
    router.register("Atom", ResponseKind::String, noop).expect("register");
    assert!(router.is_handled("ATOM"));
    router.unregister("atom").expect("unregister");
    assert!(!router.is_handled("atom"));
}

#[tokio::test]
async fn unregistered_scheme_stops_dispatching() {
    let router = local_router();
    router
        .register("atom", ResponseKind::String, |_: &ProtocolRequest, responder: Responder| {
            responder.respond("hello");
        })
        .expect("register");
    router.unregister("atom").expect("unregister");

    let err = router
        .dispatch(ProtocolRequest::get("atom://host/").expect("url"))
        .await
        .expect_err("no handler left");
    assert_eq!(err, NetworkError::NoHandler("atom".to_string()));
}
