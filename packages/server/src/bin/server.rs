//! Coordinator server entry point.

use std::sync::Arc;

use clap::Parser;

use terakoya_server::{
    domain::{ClassId, Identity, RoleSet, RosterMember, UserId},
    infrastructure::{
        collaborator::{InMemoryAttendanceSink, InMemoryIdentityProvider, InMemoryRosterProvider},
        pusher::WebSocketEventPusher,
        registry::ConnectionRegistry,
        room_hub::RoomHub,
    },
    ui::{server::Server, state::AppState},
    usecase::{
        AttendanceSessionUseCase, GetRoomsUseCase, JoinClassroomUseCase, LeaveClassroomUseCase,
        PublishNotificationUseCase, SendChatMessageUseCase,
    },
};
use terakoya_shared::{logger::setup_logger, time::SystemClock};

#[derive(Debug, Parser)]
#[command(name = "terakoya-server", about = "Live classroom coordinator server")]
struct Args {
    /// Host address to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

/// Demo accounts and rosters for running the coordinator standalone. A real
/// deployment wires the identity and roster providers to the portal.
async fn seed(identity_provider: &InMemoryIdentityProvider, roster_provider: &InMemoryRosterProvider) {
    let accounts = [
        ("admin-token", 1, "admin", vec!["admin"]),
        ("teacher-token", 2, "teacher", vec!["teacher"]),
        ("alice-token", 3, "alice", vec!["student"]),
        ("bob-token", 4, "bob", vec!["student"]),
    ];
    for (token, user_id, name, roles) in accounts {
        identity_provider
            .insert(
                token,
                Identity {
                    user_id: UserId::new(user_id),
                    name: name.to_string(),
                    roles: RoleSet::normalize(roles),
                },
            )
            .await;
    }

    roster_provider
        .set_roster(
            ClassId::new(1),
            vec![
                RosterMember {
                    user_id: UserId::new(3),
                    name: "alice".to_string(),
                    email: "alice@example.com".to_string(),
                },
                RosterMember {
                    user_id: UserId::new(4),
                    name: "bob".to_string(),
                    email: "bob@example.com".to_string(),
                },
            ],
        )
        .await;
}

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    let args = Args::parse();

    setup_logger("terakoya-server", "info");

    // 1. Shared live state
    let registry = Arc::new(ConnectionRegistry::new());
    let rooms = Arc::new(RoomHub::new());
    let clock = Arc::new(SystemClock);

    // 2. Collaborators (in-memory for the standalone binary)
    let identity_provider = Arc::new(InMemoryIdentityProvider::new());
    let roster_provider = Arc::new(InMemoryRosterProvider::new());
    let attendance_sink = Arc::new(InMemoryAttendanceSink::new());
    seed(&identity_provider, &roster_provider).await;

    // 3. Event pusher over the registry
    let event_pusher = Arc::new(WebSocketEventPusher::new(registry.clone()));

    // 4. Use cases
    let join_classroom_usecase = Arc::new(JoinClassroomUseCase::new(
        rooms.clone(),
        registry.clone(),
        roster_provider.clone(),
        event_pusher.clone(),
        clock.clone(),
    ));
    let leave_classroom_usecase = Arc::new(LeaveClassroomUseCase::new(
        rooms.clone(),
        registry.clone(),
        event_pusher.clone(),
        clock.clone(),
    ));
    let send_chat_message_usecase = Arc::new(SendChatMessageUseCase::new(
        rooms.clone(),
        registry.clone(),
        event_pusher.clone(),
        clock.clone(),
    ));
    let attendance_session_usecase = Arc::new(AttendanceSessionUseCase::new(
        rooms.clone(),
        roster_provider.clone(),
        attendance_sink.clone(),
        event_pusher.clone(),
        clock.clone(),
    ));
    let publish_notification_usecase = Arc::new(PublishNotificationUseCase::new(
        registry.clone(),
        event_pusher.clone(),
        clock.clone(),
    ));
    let get_rooms_usecase = Arc::new(GetRoomsUseCase::new(rooms.clone()));

    // 5. Application state and server
    let state = Arc::new(AppState {
        identity_provider,
        registry,
        clock,
        join_classroom_usecase,
        leave_classroom_usecase,
        send_chat_message_usecase,
        attendance_session_usecase,
        publish_notification_usecase,
        get_rooms_usecase,
    });

    Server::new(state).run(&args.host, args.port).await
}
