mod common;

use common::{
    Captured,
    Observation,
    REALM,
    create_established_peer,
    create_peer,
    id,
    uri,
};
use pretty_assertions::assert_eq;
use wamp_client::{
    core::{
        error::{
            ProtocolAnomaly,
            RequestError,
        },
        id::Id,
        types::{
            Dictionary,
            List,
            Value,
        },
    },
    message::message::{
        ErrorMessage,
        EventMessage,
        Message,
        PublishMessage,
        PublishedMessage,
        SubscribeMessage,
        SubscribedMessage,
        UnsubscribeMessage,
        UnsubscribedMessage,
    },
    peer::{
        Event,
        PeerConfig,
        PublishedEvent,
        Subscription,
    },
    transport::direct_transport::DirectTransportHandle,
};

type SubscribeResults = Captured<Result<Subscription, RequestError>>;

const TOPIC: &str = "com.test.topic";

fn subscribed(router: &DirectTransportHandle, request: u64, subscription: u64) {
    router
        .receive(Message::Subscribed(SubscribedMessage {
            subscribe_request: id(request),
            subscription: id(subscription),
        }))
        .unwrap();
}

fn event(router: &DirectTransportHandle, subscription: u64, publication: u64, arguments: List) {
    router
        .receive(Message::Event(EventMessage {
            subscription: id(subscription),
            publication: id(publication),
            details: Dictionary::default(),
            arguments,
            arguments_keyword: Dictionary::default(),
        }))
        .unwrap();
}

#[tokio::test]
async fn subscribes_and_receives_events() {
    test_utils::setup::setup_test_environment();

    let (peer, mut router, observer) = create_established_peer(1);
    let results = SubscribeResults::new();
    let events = Captured::<Event>::new();

    assert_eq!(
        peer.subscribe(uri(TOPIC), events.repeated_handler(), results.handler()),
        Some(id(1))
    );
    assert_eq!(
        router.take_messages(),
        Vec::from_iter([Message::Subscribe(SubscribeMessage {
            request: id(1),
            options: Dictionary::default(),
            topic: uri(TOPIC),
        })])
    );
    assert!(results.take().is_empty());

    subscribed(&router, 1, 77);
    let subscription = results.take().pop().unwrap().unwrap();
    assert_eq!(subscription.id(), id(77));
    assert_eq!(subscription.topic(), &uri(TOPIC));
    assert!(subscription.is_active());

    event(&router, 77, 5, List::from_iter([Value::Integer(1)]));
    event(&router, 77, 6, List::default());
    assert_eq!(
        events.take(),
        Vec::from_iter([
            Event {
                subscription: id(77),
                publication: id(5),
                details: Dictionary::default(),
                arguments: List::from_iter([Value::Integer(1)]),
                arguments_keyword: Dictionary::default(),
            },
            Event {
                subscription: id(77),
                publication: id(6),
                details: Dictionary::default(),
                arguments: List::default(),
                arguments_keyword: Dictionary::default(),
            },
        ])
    );
    assert!(observer.take().is_empty());
}

#[tokio::test]
async fn reports_events_for_unknown_subscriptions() {
    test_utils::setup::setup_test_environment();

    let (peer, router, observer) = create_established_peer(1);
    let events = Captured::<Event>::new();
    peer.subscribe(
        uri(TOPIC),
        events.repeated_handler(),
        SubscribeResults::new().handler(),
    );
    subscribed(&router, 1, 77);

    event(&router, 999, 5, List::default());
    assert!(events.take().is_empty());
    assert!(peer.is_connected());
    assert_eq!(
        observer.take(),
        Vec::from_iter([Observation::ProtocolAnomaly(
            ProtocolAnomaly::UnknownSubscription(id(999))
        )])
    );
}

#[tokio::test]
async fn router_error_fails_only_its_request() {
    test_utils::setup::setup_test_environment();

    let (peer, mut router, observer) = create_established_peer(1);
    let first = SubscribeResults::new();
    let second = SubscribeResults::new();
    peer.subscribe(uri("com.test.first"), |_| (), first.handler());
    peer.subscribe(uri("com.test.second"), |_| (), second.handler());
    router.take_messages();

    router
        .receive(Message::Error(ErrorMessage {
            request_type: 32,
            request: id(1),
            details: Dictionary::from_iter([(
                "message".to_owned(),
                Value::String("denied".to_owned()),
            )]),
            error: uri("wamp.error.not_authorized"),
            arguments: List::default(),
            arguments_keyword: Dictionary::default(),
        }))
        .unwrap();
    assert_matches::assert_matches!(first.take().as_slice(), [Err(RequestError::Router(error))] => {
        assert_eq!(error.error, uri("wamp.error.not_authorized"));
        assert_eq!(error.message(), Some("denied"));
    });
    assert!(second.take().is_empty());
    assert!(peer.is_connected());

    subscribed(&router, 2, 78);
    assert_matches::assert_matches!(second.take().as_slice(), [Ok(subscription)] => {
        assert_eq!(subscription.id(), id(78));
    });
    assert!(observer.take().is_empty());
}

#[tokio::test]
async fn reports_error_for_mismatched_request_kind() {
    test_utils::setup::setup_test_environment();

    let (peer, router, observer) = create_established_peer(1);
    let results = SubscribeResults::new();
    peer.subscribe(uri(TOPIC), |_| (), results.handler());

    router
        .receive(Message::Error(ErrorMessage {
            request_type: 48,
            request: id(1),
            details: Dictionary::default(),
            error: uri("wamp.error.no_such_procedure"),
            arguments: List::default(),
            arguments_keyword: Dictionary::default(),
        }))
        .unwrap();
    assert!(results.take().is_empty());
    assert_eq!(
        observer.take(),
        Vec::from_iter([Observation::ProtocolAnomaly(
            ProtocolAnomaly::RequestKindMismatch {
                message: "ERROR",
                request: id(1),
                pending: "SUBSCRIBE",
            }
        )])
    );

    // The request is still pending.
    subscribed(&router, 1, 77);
    assert_matches::assert_matches!(results.take().as_slice(), [Ok(_)]);
}

#[tokio::test]
async fn reports_responses_for_unknown_requests() {
    test_utils::setup::setup_test_environment();

    let (peer, router, observer) = create_established_peer(1);
    subscribed(&router, 42, 77);
    router
        .receive(Message::Error(ErrorMessage {
            request_type: 2,
            request: id(1),
            details: Dictionary::default(),
            error: uri("wamp.error.invalid_argument"),
            arguments: List::default(),
            arguments_keyword: Dictionary::default(),
        }))
        .unwrap();

    assert!(peer.is_connected());
    assert_eq!(
        observer.take(),
        Vec::from_iter([
            Observation::ProtocolAnomaly(ProtocolAnomaly::UnknownRequest {
                message: "SUBSCRIBED",
                request: id(42),
            }),
            Observation::ProtocolAnomaly(ProtocolAnomaly::UnknownRequestKind(2)),
        ])
    );
}

#[tokio::test]
async fn unsubscribes() {
    test_utils::setup::setup_test_environment();

    let (peer, mut router, observer) = create_established_peer(1);
    let results = SubscribeResults::new();
    let events = Captured::<Event>::new();
    peer.subscribe(uri(TOPIC), events.repeated_handler(), results.handler());
    subscribed(&router, 1, 77);
    let subscription = results.take().pop().unwrap().unwrap();
    router.take_messages();

    let canceled = Captured::<Result<(), RequestError>>::new();
    assert_eq!(subscription.cancel(canceled.handler()), Some(id(2)));
    assert_eq!(
        router.take_messages(),
        Vec::from_iter([Message::Unsubscribe(UnsubscribeMessage {
            request: id(2),
            subscribed_subscription: id(77),
        })])
    );
    assert!(subscription.is_active());

    router
        .receive(Message::Unsubscribed(UnsubscribedMessage {
            unsubscribe_request: id(2),
        }))
        .unwrap();
    assert_eq!(canceled.take(), Vec::from_iter([Ok(())]));
    assert!(!subscription.is_active());

    event(&router, 77, 5, List::default());
    assert!(events.take().is_empty());
    assert_eq!(
        observer.take(),
        Vec::from_iter([Observation::ProtocolAnomaly(
            ProtocolAnomaly::UnknownSubscription(id(77))
        )])
    );

    let canceled = Captured::<Result<(), RequestError>>::new();
    assert_eq!(subscription.cancel(canceled.handler()), None);
    assert_eq!(
        canceled.take(),
        Vec::from_iter([Err(RequestError::Inactive("subscription"))])
    );
    assert!(router.take_commands().is_empty());
}

#[tokio::test]
async fn second_cancel_fails_while_unsubscribe_is_pending() {
    test_utils::setup::setup_test_environment();

    let (peer, mut router, _) = create_established_peer(1);
    let results = SubscribeResults::new();
    peer.subscribe(uri(TOPIC), |_| (), results.handler());
    subscribed(&router, 1, 77);
    let subscription = results.take().pop().unwrap().unwrap();
    router.take_messages();

    let first = Captured::<Result<(), RequestError>>::new();
    let second = Captured::<Result<(), RequestError>>::new();
    assert_eq!(subscription.cancel(first.handler()), Some(id(2)));
    assert_eq!(subscription.cancel(second.handler()), None);
    assert_eq!(
        router.take_messages(),
        Vec::from_iter([Message::Unsubscribe(UnsubscribeMessage {
            request: id(2),
            subscribed_subscription: id(77),
        })])
    );
    assert!(first.take().is_empty());
    assert_eq!(
        second.take(),
        Vec::from_iter([Err(RequestError::Canceling("subscription"))])
    );

    // A rejected UNSUBSCRIBE leaves the subscription in place, so it can be canceled again.
    router
        .receive(Message::Error(ErrorMessage {
            request_type: 34,
            request: id(2),
            details: Dictionary::default(),
            error: uri("wamp.error.no_such_subscription"),
            arguments: List::default(),
            arguments_keyword: Dictionary::default(),
        }))
        .unwrap();
    assert_matches::assert_matches!(first.take().as_slice(), [Err(RequestError::Router(_))]);
    assert!(subscription.is_active());

    let third = Captured::<Result<(), RequestError>>::new();
    assert_eq!(subscription.cancel(third.handler()), Some(id(3)));
    router
        .receive(Message::Unsubscribed(UnsubscribedMessage {
            unsubscribe_request: id(3),
        }))
        .unwrap();
    assert_eq!(third.take(), Vec::from_iter([Ok(())]));
    assert!(!subscription.is_active());
}

#[tokio::test]
async fn cancel_after_session_ends_fails_without_sending() {
    test_utils::setup::setup_test_environment();

    let (peer, mut router, _) = create_established_peer(1);
    let results = SubscribeResults::new();
    peer.subscribe(uri(TOPIC), |_| (), results.handler());
    subscribed(&router, 1, 77);
    let subscription = results.take().pop().unwrap().unwrap();

    router.disconnected("gone", None);
    router.take_commands();
    assert!(!subscription.is_active());

    let canceled = Captured::<Result<(), RequestError>>::new();
    assert_eq!(subscription.cancel(canceled.handler()), None);
    assert_eq!(
        canceled.take(),
        Vec::from_iter([Err(RequestError::Inactive("subscription"))])
    );
    assert!(router.take_commands().is_empty());
}

#[tokio::test]
async fn replaced_subscription_is_deactivated() {
    test_utils::setup::setup_test_environment();

    let (peer, router, _) = create_established_peer(1);
    let results = SubscribeResults::new();
    peer.subscribe(uri(TOPIC), |_| (), results.handler());
    peer.subscribe(uri(TOPIC), |_| (), results.handler());
    subscribed(&router, 1, 77);
    subscribed(&router, 2, 77);

    let subscriptions = results
        .take()
        .into_iter()
        .map(|result| result.unwrap())
        .collect::<Vec<_>>();
    assert_eq!(subscriptions.len(), 2);
    assert!(!subscriptions[0].is_active());
    assert!(subscriptions[1].is_active());
}

#[tokio::test]
async fn publishes_without_acknowledgement() {
    test_utils::setup::setup_test_environment();

    let (peer, mut router, observer) = create_established_peer(1);
    let event = PublishedEvent {
        arguments: List::default(),
        arguments_keyword: Dictionary::from_iter([("a".to_owned(), Value::Bool(true))]),
        ..Default::default()
    };
    assert_eq!(peer.publish(uri(TOPIC), event), Ok(id(1)));
    assert_eq!(
        router.take_messages(),
        Vec::from_iter([Message::Publish(PublishMessage {
            request: id(1),
            options: Dictionary::default(),
            topic: uri(TOPIC),
            arguments: List::default(),
            arguments_keyword: Dictionary::from_iter([("a".to_owned(), Value::Bool(true))]),
        })])
    );

    // Nothing is waiting for the router.
    router
        .receive(Message::Published(PublishedMessage {
            publish_request: id(1),
            publication: id(500),
        }))
        .unwrap();
    assert_eq!(
        observer.take(),
        Vec::from_iter([Observation::ProtocolAnomaly(
            ProtocolAnomaly::UnknownRequest {
                message: "PUBLISHED",
                request: id(1),
            }
        )])
    );
}

#[tokio::test]
async fn publishes_with_acknowledgement() {
    test_utils::setup::setup_test_environment();

    let (peer, mut router, _) = create_established_peer(1);
    let published = Captured::<Result<Id, RequestError>>::new();
    assert_eq!(
        peer.publish_acknowledged(
            uri(TOPIC),
            PublishedEvent {
                arguments: List::from_iter([Value::String("hi".to_owned())]),
                arguments_keyword: Dictionary::default(),
                ..Default::default()
            },
            published.handler(),
        ),
        Some(id(1))
    );
    assert_matches::assert_matches!(router.take_messages().as_slice(), [Message::Publish(publish)] => {
        assert_eq!(
            publish.options,
            Dictionary::from_iter([("acknowledge".to_owned(), Value::Bool(true))])
        );
    });

    router
        .receive(Message::Published(PublishedMessage {
            publish_request: id(1),
            publication: id(500),
        }))
        .unwrap();
    assert_eq!(published.take(), Vec::from_iter([Ok(id(500))]));
}

#[tokio::test]
async fn sends_subscribe_options() {
    test_utils::setup::setup_test_environment();

    let (peer, mut router, _) = create_established_peer(1);
    let results = SubscribeResults::new();
    let options = Dictionary::from_iter([(
        "match".to_owned(),
        Value::String("prefix".to_owned()),
    )]);
    assert_eq!(
        peer.subscribe_with_options(
            uri("com.test"),
            options.clone(),
            |_: Event| (),
            results.handler(),
        ),
        Some(id(1))
    );
    assert_eq!(
        router.take_messages(),
        Vec::from_iter([Message::Subscribe(SubscribeMessage {
            request: id(1),
            options,
            topic: uri("com.test"),
        })])
    );
}

#[tokio::test]
async fn merges_acknowledge_into_publish_options() {
    test_utils::setup::setup_test_environment();

    let (peer, mut router, _) = create_established_peer(1);
    let event = PublishedEvent {
        options: Dictionary::from_iter([
            ("exclude_me".to_owned(), Value::Bool(false)),
            ("acknowledge".to_owned(), Value::Bool(true)),
        ]),
        ..Default::default()
    };

    assert_eq!(peer.publish(uri(TOPIC), event.clone()), Ok(id(1)));
    assert_matches::assert_matches!(router.take_messages().as_slice(), [Message::Publish(publish)] => {
        assert_eq!(
            publish.options,
            Dictionary::from_iter([("exclude_me".to_owned(), Value::Bool(false))])
        );
    });

    let mut event = event;
    event.options.remove("acknowledge");
    let published = Captured::<Result<Id, RequestError>>::new();
    assert_eq!(
        peer.publish_acknowledged(uri(TOPIC), event, published.handler()),
        Some(id(2))
    );
    assert_matches::assert_matches!(router.take_messages().as_slice(), [Message::Publish(publish)] => {
        assert_eq!(
            publish.options,
            Dictionary::from_iter([
                ("acknowledge".to_owned(), Value::Bool(true)),
                ("exclude_me".to_owned(), Value::Bool(false)),
            ])
        );
    });
}

#[tokio::test]
async fn requests_fail_when_not_connected() {
    test_utils::setup::setup_test_environment();

    let (peer, mut router, _) = create_peer(PeerConfig::new(uri(REALM)));
    let results = SubscribeResults::new();
    assert_eq!(peer.subscribe(uri(TOPIC), |_| (), results.handler()), None);
    assert_matches::assert_matches!(
        results.take().as_slice(),
        [Err(RequestError::NotConnected(_))]
    );
    assert_matches::assert_matches!(
        peer.publish(uri(TOPIC), PublishedEvent::default()),
        Err(RequestError::NotConnected(_))
    );
    assert!(router.take_commands().is_empty());
}

#[tokio::test]
async fn event_handler_can_call_back_into_peer() {
    test_utils::setup::setup_test_environment();

    let (peer, mut router, _) = create_established_peer(1);
    let publisher = peer.clone();
    peer.subscribe(
        uri(TOPIC),
        move |event: Event| {
            publisher
                .publish(
                    uri("com.test.echo"),
                    PublishedEvent {
                        arguments: event.arguments,
                        arguments_keyword: Dictionary::default(),
                        ..Default::default()
                    },
                )
                .unwrap();
        },
        SubscribeResults::new().handler(),
    );
    subscribed(&router, 1, 77);
    router.take_messages();

    event(&router, 77, 5, List::from_iter([Value::Integer(3)]));
    assert_matches::assert_matches!(router.take_messages().as_slice(), [Message::Publish(publish)] => {
        assert_eq!(publish.topic, uri("com.test.echo"));
        assert_eq!(publish.arguments, List::from_iter([Value::Integer(3)]));
    });
}
