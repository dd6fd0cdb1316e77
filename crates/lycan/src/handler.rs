//! Per-connection request loop.
//!
//! Each client gets one task that decodes envelopes, dispatches them to
//! the [`RoomManager`], and writes the reply with `reply_to` set. Rooms
//! the client subscribed to are forwarded on the same socket as
//! `Changed` pushes.

use std::collections::HashMap;
use std::sync::Arc;

use lycan_protocol::{ChangeEvent, Codec, Envelope, Request, Response, RoomId};
use lycan_room::{RoomError, RoomFeed};
use lycan_store::RecordStore;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::LycanError;
use crate::server::ServerState;
use crate::transport::WebSocketConnection;

/// Change pushes buffered per connection. Beyond this a slow client
/// misses events and re-reads the status on the next one it gets.
const PUSH_QUEUE: usize = 64;

/// Drives one client until it disconnects, goes idle, or the socket fails.
pub(crate) async fn handle_connection<S: RecordStore, C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<S, C>>,
) -> Result<(), LycanError> {
    let conn_id = conn.id();
    info!(%conn_id, "client connected");

    let (push_tx, mut push_rx) = mpsc::channel(PUSH_QUEUE);
    let mut session = Session {
        state: Arc::clone(&state),
        pushes: push_tx,
        feeds: HashMap::new(),
    };
    let mut seq: u64 = 0;

    loop {
        tokio::select! {
            frame = tokio::time::timeout(state.connection_idle, conn.recv()) => {
                let data = match frame {
                    Ok(Ok(Some(data))) => data,
                    Ok(Ok(None)) => {
                        info!(%conn_id, "client disconnected");
                        break;
                    }
                    Ok(Err(e)) => return Err(e.into()),
                    Err(_) => {
                        info!(%conn_id, "closing idle connection");
                        let _ = conn.close().await;
                        break;
                    }
                };

                let envelope: Envelope<Request> = match state.codec.decode(&data) {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        debug!(%conn_id, error = %e, "undecodable frame");
                        let reply = Envelope::new(next_seq(&mut seq), Response::Error {
                            code: 400,
                            message: e.to_string(),
                        });
                        send(&conn, &state.codec, &reply).await?;
                        continue;
                    }
                };

                let response = session.respond(envelope.payload).await;
                let reply = Envelope::reply(next_seq(&mut seq), envelope.seq, response);
                send(&conn, &state.codec, &reply).await?;
            }
            Some(event) = push_rx.recv() => {
                let push = Envelope::new(next_seq(&mut seq), Response::Changed { event });
                send(&conn, &state.codec, &push).await?;
            }
        }
    }

    Ok(())
}

/// What one connection holds beyond the shared state.
struct Session<S: RecordStore, C: Codec> {
    state: Arc<ServerState<S, C>>,
    pushes: mpsc::Sender<ChangeEvent>,
    feeds: HashMap<RoomId, JoinHandle<()>>,
}

impl<S: RecordStore, C: Codec> Session<S, C> {
    async fn respond(&mut self, request: Request) -> Response {
        match self.dispatch(request).await {
            Ok(response) => response,
            Err(e) => {
                let code = e.status_code();
                if code >= 500 {
                    warn!(error = %e, "request failed");
                } else {
                    debug!(code, error = %e, "request rejected");
                }
                Response::Error {
                    code,
                    message: e.to_string(),
                }
            }
        }
    }

    async fn dispatch(&mut self, request: Request) -> Result<Response, RoomError> {
        let rooms = &self.state.rooms;
        let response = match request {
            Request::CreateRoom {
                host_id,
                host_name,
                max_players,
                min_players,
            } => {
                let (room, player) = rooms
                    .create_room(host_id, host_name, max_players, min_players)
                    .await?;
                Response::RoomCreated { room, player }
            }
            Request::JoinRoom {
                code,
                user_id,
                name,
            } => {
                let (room, players) = rooms.join_room(&code, user_id, &name).await?;
                Response::RoomJoined { room, players }
            }
            Request::StartRoom { code } => {
                let (phase, phase_end_at) = rooms.start_room(&code).await?;
                Response::RoomStarted {
                    phase,
                    phase_end_at,
                }
            }
            Request::GetStatus { code, viewer } => {
                let view = rooms.get_status_as(&code, viewer.as_ref()).await?;
                Response::Status {
                    room: view.room,
                    players: view.players,
                    time_left: view.time_left,
                }
            }
            Request::CastVote {
                code,
                round,
                voter_id,
                target_id,
            } => Response::VoteCast {
                vote: rooms.cast_vote(&code, round, voter_id, target_id).await?,
            },
            Request::ListVotes { code, round } => Response::Votes {
                votes: rooms.list_votes(&code, round).await?,
            },
            Request::Tally { code, round } => Response::Tally {
                result: rooms.tally(&code, round).await?,
            },
            Request::TogglePhase { code, requester } => Response::PhaseChanged {
                room: rooms.toggle_phase(&code, &requester).await?,
            },
            Request::AdvancePhase { code, requester } => Response::PhaseChanged {
                room: rooms.advance_phase(&code, &requester).await?,
            },
            Request::FinishRoom {
                code,
                requester,
                winner,
            } => Response::PhaseChanged {
                room: rooms.finish_room(&code, &requester, winner).await?,
            },
            Request::Subscribe { code } => {
                let feed = rooms.subscribe(&code).await?;
                let room_id = feed.room_id();
                // Subscribing twice to one room keeps the first forwarder.
                if !self.feeds.contains_key(&room_id) {
                    let forwarder = forward(feed, self.pushes.clone());
                    self.feeds.insert(room_id, forwarder);
                }
                Response::Subscribed { room_id }
            }
            Request::Ping => Response::Pong,
        };
        Ok(response)
    }
}

impl<S: RecordStore, C: Codec> Drop for Session<S, C> {
    fn drop(&mut self) {
        for (_, forwarder) in self.feeds.drain() {
            forwarder.abort();
        }
    }
}

/// Copies one room's feed into the connection's push queue. Never waits
/// on the socket: when the queue is full the event is dropped.
fn forward(mut feed: RoomFeed, pushes: mpsc::Sender<ChangeEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let room_id = feed.room_id();
        while let Some(event) = feed.recv().await {
            match pushes.try_send(event) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    debug!(%room_id, "push queue full, dropping change event");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => break,
            }
        }
    })
}

async fn send<C: Codec>(
    conn: &WebSocketConnection,
    codec: &C,
    envelope: &Envelope<Response>,
) -> Result<(), LycanError> {
    let bytes = codec.encode(envelope)?;
    conn.send(&bytes).await?;
    Ok(())
}

fn next_seq(seq: &mut u64) -> u64 {
    *seq += 1;
    *seq
}
