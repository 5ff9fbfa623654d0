#![allow(clippy::unwrap_used)]
// Integration tests for `Api` and `System` against a wiremock server.

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::{Value, json};
use url::Url;
use wiremock::matchers::{body_json, body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use simplisafe_core::{
    Api, AuthCredentials, ClientConfig, CoreError, Device, LockState, System, SystemProperties,
    SystemState, SystemVersion, Volume, WebsocketEvent,
};

const USER_ID: u64 = 12345;
const SID: u64 = 98765;

// ── Helpers ─────────────────────────────────────────────────────────

async fn login() -> (MockServer, Api) {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access-1",
            "refresh_token": "refresh-1",
            "expires_in": 3600
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/authCheck"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "userId": USER_ID })))
        .mount(&server)
        .await;

    let config = ClientConfig::new(AuthCredentials::Password {
        email: "user@example.com".into(),
        password: SecretString::from("hunter2".to_owned()),
    })
    .with_client_id("test-client")
    .with_api_url(Url::parse(&server.uri()).unwrap());
    let api = Api::login(&config).await.unwrap();
    (server, api)
}

fn subscription(sid: u64, version: Option<u64>, active: bool) -> Value {
    let mut system = json!({
        "serial": "1234ABCD",
        "alarmState": "OFF",
        "isAlarming": false,
        "connType": "wifi",
        "temperature": 67,
        "isActive": active,
    });
    if let Some(version) = version {
        system["version"] = json!(version);
    }
    json!({
        "sid": sid,
        "location": { "street1": "1234 Main Street", "system": system }
    })
}

fn lock_sensor(lock_state: u64, jammed: bool) -> Value {
    json!({
        "serial": "ABC123",
        "type": 16,
        "name": "Front Door",
        "setting": {},
        "status": {
            "lockState": lock_state,
            "lockJamState": jammed,
            "lockDisabled": false,
            "lockLowBattery": false,
            "pinPadLowBattery": false,
            "pinPadOffline": false
        },
        "flags": { "lowBattery": false, "offline": false }
    })
}

fn entry_sensor() -> Value {
    json!({
        "serial": "825075",
        "type": 5,
        "name": "Back Door",
        "setting": { "instantTrigger": false },
        "status": { "triggered": true },
        "flags": { "lowBattery": true, "offline": false }
    })
}

fn settings(users: Value) -> Value {
    json!({
        "settings": {
            "normal": {
                "alarmDuration": 240,
                "alarmVolume": 3,
                "doorChime": 2,
                "entryDelayAway": 30,
                "entryDelayHome": 30,
                "exitDelayAway": 60,
                "exitDelayHome": 0,
                "light": true,
                "voicePrompts": 2,
                "wifiSSID": "MY_WIFI"
            },
            "pins": {
                "master": { "pin": "1234" },
                "duress": { "pin": "9876" },
                "users": users
            }
        },
        "basestationStatus": {
            "backupBattery": 5_293,
            "wallPower": 5_933,
            "gsmRssi": -73,
            "wifiRssi": -49,
            "rfJamming": false
        }
    })
}

fn default_users() -> Value {
    json!([
        { "name": "Test 1", "pin": "3456" },
        { "name": "", "pin": "" },
        { "name": "", "pin": "" },
        { "name": "", "pin": "" }
    ])
}

async fn mount_subscriptions(server: &MockServer, subscriptions: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path(format!("/users/{USER_ID}/subscriptions")))
        .and(query_param("activeOnly", "true"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "subscriptions": subscriptions })),
        )
        .mount(server)
        .await;
}

async fn mount_sensors(server: &MockServer, sensors: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path(format!("/ss3/subscriptions/{SID}/sensors")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "sensors": sensors })))
        .mount(server)
        .await;
}

async fn mount_settings(server: &MockServer, body: Value) {
    Mock::given(method("GET"))
        .and(path(format!("/ss3/subscriptions/{SID}/settings/normal")))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// A logged-in session with one v3 system holding a lock and an entry
/// sensor.
async fn v3_system(lock_state: u64, jammed: bool) -> (MockServer, Api, System) {
    let (server, api) = login().await;
    mount_subscriptions(&server, vec![subscription(SID, Some(3), true)]).await;
    mount_sensors(&server, vec![lock_sensor(lock_state, jammed), entry_sensor()]).await;
    mount_settings(&server, settings(default_users())).await;
    let mut systems = api.get_systems().await.unwrap();
    let system = systems.remove(&SID).unwrap();
    (server, api, system)
}

fn lock_of(system: &System) -> simplisafe_core::Lock {
    match system.device("ABC123").unwrap() {
        Device::Lock(lock) => lock,
        other => panic!("expected lock, got {other:?}"),
    }
}

// ── Discovery ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_get_systems_discovers_locked_lock() {
    let (_server, api, system) = v3_system(1, false).await;

    assert_eq!(api.user_id(), Some(USER_ID));
    assert_eq!(system.version(), SystemVersion::V3);
    assert_eq!(system.state(), SystemState::Off);
    assert_eq!(system.address().unwrap(), "1234 Main Street");
    assert_eq!(system.serial().unwrap(), "1234ABCD");
    assert_eq!(system.connection_type().unwrap(), "wifi");
    assert_eq!(system.temperature(), Some(67));
    assert!(!system.alarm_going_off().unwrap());

    let serials: Vec<String> = system
        .entities()
        .iter()
        .map(|d| d.serial().to_owned())
        .collect();
    assert_eq!(serials, ["ABC123", "825075"]);

    let lock = lock_of(&system);
    assert_eq!(lock.name().unwrap(), "Front Door");
    assert_eq!(lock.state().unwrap(), LockState::Locked);
    assert!(!lock.disabled().unwrap());
    assert!(!lock.pin_pad_offline().unwrap());
}

#[tokio::test]
async fn test_get_systems_skips_incomplete_and_inactive() {
    let (server, api) = login().await;
    mount_subscriptions(
        &server,
        vec![
            subscription(1, None, true),
            subscription(2, Some(3), false),
            subscription(SID, Some(3), true),
        ],
    )
    .await;
    mount_sensors(&server, vec![entry_sensor()]).await;
    mount_settings(&server, settings(default_users())).await;

    let systems = api.get_systems().await.unwrap();

    assert_eq!(systems.len(), 1);
    assert!(systems.contains_key(&SID));
    // The deactivated system is still listed, the incomplete one is not.
    let data = api.subscription_data();
    assert!(data.contains_key(&2));
    assert!(!data.contains_key(&1));
}

#[tokio::test]
async fn test_sensor_accessors() {
    let (_server, _api, system) = v3_system(1, false).await;

    let sensors = system.sensors();
    assert_eq!(sensors.len(), 1);
    let sensor = &sensors[0];
    assert!(sensor.triggered().unwrap());
    assert!(sensor.low_battery().unwrap());
    assert!(!sensor.offline().unwrap());
    assert!(!sensor.error().unwrap());
    assert!(!sensor.trigger_instantly().unwrap());
    assert!(matches!(
        sensor.temperature(),
        Err(CoreError::Unsupported { .. })
    ));
    assert!(matches!(sensor.data(), Err(CoreError::Unsupported { .. })));
}

// ── Locks ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_jam_flag_overrides_lock_code() {
    let (_server, _api, system) = v3_system(1, true).await;
    assert_eq!(lock_of(&system).state().unwrap(), LockState::Jammed);
}

#[tokio::test]
async fn test_unknown_lock_code_reads_unknown() {
    let (_server, _api, system) = v3_system(7, false).await;
    assert_eq!(lock_of(&system).state().unwrap(), LockState::Unknown);
}

#[tokio::test]
async fn test_unlock_updates_state_optimistically() {
    let (server, _api, system) = v3_system(1, false).await;
    Mock::given(method("POST"))
        .and(path(format!("/doorlock/{SID}/ABC123/state")))
        .and(body_json(json!({ "state": "unlock" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let lock = lock_of(&system);
    lock.unlock().await.unwrap();

    assert_eq!(lock.state().unwrap(), LockState::Unlocked);
    assert_eq!(lock.raw().unwrap()["status"]["lockState"], 2);
}

#[tokio::test]
async fn test_failed_lock_command_leaves_state() {
    let (server, _api, system) = v3_system(2, false).await;
    Mock::given(method("POST"))
        .and(path(format!("/doorlock/{SID}/ABC123/state")))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let lock = lock_of(&system);
    let err = lock.lock().await.unwrap_err();

    assert!(matches!(err, CoreError::Request { status: Some(500), .. }));
    assert_eq!(lock.state().unwrap(), LockState::Unlocked);
}

// ── Refresh ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_refresh_drops_stale_entities() {
    let (server, api) = login().await;
    mount_subscriptions(&server, vec![subscription(SID, Some(3), true)]).await;
    mount_settings(&server, settings(default_users())).await;
    Mock::given(method("GET"))
        .and(path(format!("/ss3/subscriptions/{SID}/sensors")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "sensors": [lock_sensor(1, false), entry_sensor()] })),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_sensors(&server, vec![entry_sensor()]).await;

    let systems = api.get_systems().await.unwrap();
    let system = &systems[&SID];
    let lock = lock_of(system);

    lock.update(false).await.unwrap();

    assert!(matches!(
        lock.state(),
        Err(CoreError::EntityNotFound { serial }) if serial == "ABC123"
    ));
    assert_eq!(system.entities().len(), 1);
}

#[tokio::test]
async fn test_failed_refresh_keeps_previous_state() {
    let (server, api) = login().await;
    mount_subscriptions(&server, vec![subscription(SID, Some(3), true)]).await;
    mount_settings(&server, settings(default_users())).await;
    Mock::given(method("GET"))
        .and(path(format!("/ss3/subscriptions/{SID}/sensors")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "sensors": [lock_sensor(1, false)] })),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/ss3/subscriptions/{SID}/sensors")))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let systems = api.get_systems().await.unwrap();
    let system = &systems[&SID];

    assert!(system.refresh(Default::default()).await.is_err());
    assert_eq!(lock_of(system).state().unwrap(), LockState::Locked);
}

#[tokio::test]
async fn test_refresh_with_location_updates_state() {
    let (server, api) = login().await;
    let mut armed = subscription(SID, Some(3), true);
    armed["location"]["system"]["alarmState"] = json!("AWAY");
    Mock::given(method("GET"))
        .and(path(format!("/users/{USER_ID}/subscriptions")))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            json!({ "subscriptions": [subscription(SID, Some(3), true)] }),
        ))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_subscriptions(&server, vec![armed]).await;
    mount_sensors(&server, vec![entry_sensor()]).await;
    mount_settings(&server, settings(default_users())).await;

    let systems = api.get_systems().await.unwrap();
    let system = &systems[&SID];
    let mut states = system.subscribe_state();
    assert_eq!(system.state(), SystemState::Off);

    system.refresh(Default::default()).await.unwrap();

    assert_eq!(system.state(), SystemState::Away);
    assert!(states.has_changed().unwrap());
    assert_eq!(*states.borrow_and_update(), SystemState::Away);
}

// ── State and events ────────────────────────────────────────────────

#[tokio::test]
async fn test_set_state_follows_server_answer() {
    let (server, _api, system) = v3_system(1, false).await;
    Mock::given(method("POST"))
        .and(path(format!("/ss3/subscriptions/{SID}/state/away")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "state": "AWAY_COUNT" })))
        .expect(1)
        .mount(&server)
        .await;

    system.set_away().await.unwrap();

    assert_eq!(system.state(), SystemState::AwayCount);
}

#[tokio::test]
async fn test_latest_event_is_first_in_server_order() {
    let (server, _api, system) = v3_system(1, false).await;
    Mock::given(method("GET"))
        .and(path(format!("/subscriptions/{SID}/events")))
        .and(query_param("numEvents", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "numEvents": 1,
            "events": [{ "eventId": 2, "eventCid": 1400, "eventTimestamp": 1_564_018_073 }]
        })))
        .mount(&server)
        .await;

    let event = system.get_latest_event().await.unwrap();

    assert_eq!(event.event_id, Some(2));
    assert_eq!(event.event_cid, Some(1400));
}

#[tokio::test]
async fn test_endpoint_unavailable_surfaces() {
    let (server, _api, system) = v3_system(1, false).await;
    Mock::given(method("GET"))
        .and(path(format!("/subscriptions/{SID}/events")))
        .respond_with(
            ResponseTemplate::new(403).set_body_json(json!({ "type": "NoRemoteManagement" })),
        )
        .mount(&server)
        .await;

    let err = system.get_events(None, None).await.unwrap_err();

    assert!(err.is_endpoint_unavailable());
}

#[tokio::test]
async fn test_pushed_events_move_state() {
    let (_server, _api, system) = v3_system(1, false).await;
    let event = |sid: u64, cid: u32| -> WebsocketEvent {
        serde_json::from_value(json!({ "eventCid": cid, "sid": sid, "info": "" })).unwrap()
    };

    assert!(system.apply_event(&event(SID, 3481)));
    assert_eq!(system.state(), SystemState::Away);

    assert!(!system.apply_event(&event(SID + 1, 1110)));
    assert!(!system.apply_event(&event(SID, 1409)));
    assert!(!system.apply_event(&WebsocketEvent::from_payload(serde_json::Value::Null)));
    assert_eq!(system.state(), SystemState::Away);

    assert!(system.apply_event(&event(SID, 1407)));
    assert_eq!(system.state(), SystemState::Off);
}

// ── PINs ────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_get_pins_lists_reserved_first() {
    let (_server, _api, system) = v3_system(1, false).await;

    let pins = system.get_pins(false).await.unwrap();
    let labels: Vec<&str> = pins.keys().map(String::as_str).collect();

    assert_eq!(labels, ["master", "duress", "Test 1"]);
}

#[tokio::test]
async fn test_set_pin_sends_full_payload() {
    let (server, _api, system) = v3_system(1, false).await;
    Mock::given(method("POST"))
        .and(path(format!("/ss3/subscriptions/{SID}/settings/pins")))
        .and(body_partial_json(json!({
            "pins": {
                "master": { "pin": "1234" },
                "duress": { "pin": "9876" },
                "users": {
                    "0": { "name": "Test 1", "pin": "3456" },
                    "1": { "name": "Kid", "pin": "5555" },
                    "2": { "name": "", "pin": "" }
                }
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(settings(json!([
            { "name": "Test 1", "pin": "3456" },
            { "name": "Kid", "pin": "5555" }
        ]))))
        .expect(1)
        .mount(&server)
        .await;

    system.set_pin("Kid", "5555").await.unwrap();
}

#[tokio::test]
async fn test_set_pin_rejects_bad_input() {
    let (server, _api, system) = v3_system(1, false).await;
    Mock::given(method("POST"))
        .and(path(format!("/ss3/subscriptions/{SID}/settings/pins")))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    for (label, pin) in [("Kid", "123"), ("Kid", "12a4"), ("Kid", "3456")] {
        let err = system.set_pin(label, pin).await.unwrap_err();
        assert!(matches!(err, CoreError::Pin { .. }), "{label}/{pin}: {err}");
    }
}

#[tokio::test]
async fn test_remove_pin_refuses_reserved_and_missing() {
    let (_server, _api, system) = v3_system(1, false).await;

    for target in ["master", "duress", "9876", "0000"] {
        let err = system.remove_pin(target).await.unwrap_err();
        assert!(matches!(err, CoreError::Pin { .. }), "{target}: {err}");
    }
}

#[tokio::test]
async fn test_remove_pin_by_value() {
    let (server, _api, system) = v3_system(1, false).await;
    Mock::given(method("POST"))
        .and(path(format!("/ss3/subscriptions/{SID}/settings/pins")))
        .and(body_partial_json(json!({
            "pins": { "users": { "0": { "name": "", "pin": "" } } }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(settings(json!([]))))
        .expect(1)
        .mount(&server)
        .await;

    system.remove_pin("3456").await.unwrap();
}

// ── Settings ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_settings_accessors() {
    let (_server, _api, system) = v3_system(1, false).await;

    assert_eq!(system.alarm_duration().unwrap(), 240);
    assert_eq!(system.alarm_volume().unwrap(), Volume::High);
    assert_eq!(system.chime_volume().unwrap(), Volume::Medium);
    assert_eq!(system.exit_delay_away().unwrap(), 60);
    assert!(system.light().unwrap());
    assert_eq!(system.wifi_ssid().unwrap(), "MY_WIFI");
    assert_eq!(system.gsm_strength().unwrap(), -73);
    assert!(!system.rf_jamming().unwrap());
}

#[tokio::test]
async fn test_set_properties_validates_then_posts() {
    let (server, _api, system) = v3_system(1, false).await;
    let mut updated = settings(default_users());
    updated["settings"]["normal"]["alarmDuration"] = json!(300);
    Mock::given(method("POST"))
        .and(path(format!("/ss3/subscriptions/{SID}/settings/normal")))
        .and(body_json(json!({ "normal": { "alarmDuration": 300 } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(updated))
        .expect(1)
        .mount(&server)
        .await;

    let invalid = SystemProperties {
        alarm_duration: Some(10),
        ..SystemProperties::default()
    };
    assert!(matches!(
        system.set_properties(&invalid).await,
        Err(CoreError::Validation { .. })
    ));

    let valid = SystemProperties {
        alarm_duration: Some(300),
        ..SystemProperties::default()
    };
    system.set_properties(&valid).await.unwrap();

    assert_eq!(system.alarm_duration().unwrap(), 300);
}

// ── Session ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_logout_clears_session() {
    let (_server, api) = login().await;
    assert!(api.refresh_token().is_some());
    assert_eq!(api.client_id(), "test-client");

    api.logout().await;

    assert!(api.refresh_token().is_none());
    assert_eq!(api.user_id(), None);
}
