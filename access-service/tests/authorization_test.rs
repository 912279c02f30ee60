//! Authorization engine integration tests: role ordering, anti-leakage and
//! the platform scope.

mod common;

use access_service::models::{Action, ResourceRef, Role};
use common::spawn_app;

#[tokio::test]
async fn non_member_cannot_distinguish_resource_from_missing() {
    let app = spawn_app();
    let organization = app.seed_organization("Acme", "alice").await;
    app.seed_principal("mallory").await;
    let mallory = app.principal("mallory").await;

    let resource = ResourceRef::organization(&organization.id);
    for action in [Action::Read, Action::Write, Action::Administer] {
        let err = app
            .state
            .authz
            .authorize(&mallory, action, &resource)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "not_found", "action {:?}", action);
    }
}

#[tokio::test]
async fn role_order_gates_each_action() {
    let app = spawn_app();
    let organization = app.seed_organization("Acme", "alice").await;

    let cases = [
        ("viewer", Role::Viewer),
        ("operator", Role::Operator),
        ("admin", Role::Admin),
        ("owner2", Role::Owner),
    ];
    for (principal_id, role) in cases {
        app.seed_member(&organization.id, principal_id, role).await;
    }

    let resource = ResourceRef::organization(&organization.id);
    for (principal_id, role) in cases {
        let principal = app.principal(principal_id).await;
        for action in [Action::Read, Action::Write, Action::Administer] {
            let decision = app.state.authz.authorize(&principal, action, &resource).await;
            if role >= action.required_role() {
                assert_eq!(
                    decision.unwrap(),
                    organization.id,
                    "{:?} should allow {:?}",
                    role,
                    action
                );
            } else {
                assert_eq!(
                    decision.unwrap_err().kind(),
                    "forbidden",
                    "{:?} should deny {:?}",
                    role,
                    action
                );
            }
        }
    }
}

#[tokio::test]
async fn authorization_walks_up_to_the_owning_organization() {
    let app = spawn_app();
    let organization = app.seed_organization("Acme", "alice").await;
    let location = app.seed_location(&organization.id, "HQ", "UTC").await;
    let door = app.seed_access_point(&location.id, "front-door").await;

    let alice = app.principal("alice").await;
    let granted = app
        .state
        .authz
        .authorize(&alice, Action::Write, &ResourceRef::access_point(&door.id))
        .await
        .unwrap();
    assert_eq!(granted, organization.id);
}

#[tokio::test]
async fn missing_resource_is_not_found_even_for_owners() {
    let app = spawn_app();
    app.seed_organization("Acme", "alice").await;
    let alice = app.principal("alice").await;

    let err = app
        .state
        .authz
        .authorize(&alice, Action::Read, &ResourceRef::location("no-such-id"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "not_found");
}

#[tokio::test]
async fn platform_scope_ignores_organization_roles() {
    let app = spawn_app();
    let organization = app.seed_organization("Acme", "alice").await;
    app.seed_member(&organization.id, common::PLATFORM_ADMIN, Role::Viewer)
        .await;

    let alice = app.principal("alice").await;
    let root = app.principal(common::PLATFORM_ADMIN).await;

    // An Owner is still not a platform admin.
    assert_eq!(
        app.state.authz.authorize_platform(&alice).unwrap_err().kind(),
        "forbidden"
    );
    assert!(app.state.authz.authorize_platform(&root).is_ok());
}
