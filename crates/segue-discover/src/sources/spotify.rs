//! Spotify Web API client.
//!
//! Catalog search and element lookup run on an app token obtained with
//! the client-credentials flow. Playlist and queue edits need a user token
//! obtained out of band.

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Mutex;

use segue_core::TrackReference;

use super::{check_status, http_client, CatalogSearch, PlaylistEditor};
use crate::error::{SourceError, SourceResult};

const SOURCE: &str = "Spotify";
const API_BASE: &str = "https://api.spotify.com/v1";
const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

/// Refresh the app token this long before it expires.
const TOKEN_MARGIN: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    tracks: Paging<TrackObject>,
}

#[derive(Debug, Deserialize)]
struct Paging<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct TrackObject {
    // Local files have no id.
    id: Option<String>,
    name: String,
    #[serde(default)]
    artists: Vec<NamedRef>,
}

#[derive(Debug, Deserialize)]
struct NamedRef {
    name: String,
}

#[derive(Debug, Deserialize)]
struct AlbumObject {
    id: String,
    name: String,
    #[serde(default)]
    artists: Vec<NamedRef>,
    #[serde(default)]
    total_tracks: u32,
}

#[derive(Debug, Deserialize)]
struct ArtistObject {
    id: String,
    name: String,
    #[serde(default)]
    genres: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistObject {
    id: String,
    name: String,
    owner: PlaylistOwner,
    tracks: PlaylistTracks,
}

#[derive(Debug, Deserialize)]
struct PlaylistOwner {
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistTracks {
    total: u32,
}

#[derive(Debug, Deserialize)]
struct UserObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct PlaylistPage {
    #[serde(default = "Vec::new")]
    items: Vec<SimplePlaylist>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SimplePlaylist {
    id: String,
    name: String,
    owner: UserObject,
}

#[derive(Debug, Deserialize)]
struct CreatedPlaylist {
    id: String,
}

impl PlaylistPage {
    fn find_owned(&self, name: &str, user_id: &str) -> Option<String> {
        self.items
            .iter()
            .find(|p| p.name == name && p.owner.id == user_id)
            .map(|p| p.id.clone())
    }
}

impl TrackObject {
    fn into_reference(self) -> Option<TrackReference> {
        let id = self.id?;
        let mut names = self.artists.into_iter().map(|a| a.name);
        let artist = names.next().unwrap_or_default();
        Some(TrackReference::new(id, self.name, artist).with_featured_artists(names.collect()))
    }
}

// ---------------------------------------------------------------------------
// Typed element lookup
// ---------------------------------------------------------------------------

/// The kinds of catalog element an id can refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Track,
    Album,
    Artist,
    Playlist,
}

impl ElementKind {
    /// Kinds tried, in order, when the kind of an id is unknown.
    pub const LOOKUP_ORDER: [Self; 4] = [Self::Playlist, Self::Track, Self::Album, Self::Artist];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Track => "track",
            Self::Album => "album",
            Self::Artist => "artist",
            Self::Playlist => "playlist",
        }
    }

    const fn path(self) -> &'static str {
        match self {
            Self::Track => "tracks",
            Self::Album => "albums",
            Self::Artist => "artists",
            Self::Playlist => "playlists",
        }
    }

    /// Split a share link, a `spotify:` URI or a bare id into its kind
    /// (when the input names one) and id.
    pub fn parse_link(input: &str) -> (Option<Self>, String) {
        let input = input.trim();

        if let Some(rest) = input.strip_prefix("spotify:") {
            if let Some((kind, id)) = rest.split_once(':') {
                if let Ok(kind) = kind.parse() {
                    return (Some(kind), id.to_string());
                }
            }
        }

        if let Some(rest) = input
            .strip_prefix("https://open.spotify.com/")
            .or_else(|| input.strip_prefix("http://open.spotify.com/"))
        {
            let path = rest.split(['?', '#']).next().unwrap_or_default();
            let mut segments = path.split('/').filter(|s| !s.is_empty());
            // Localized links look like /intl-de/track/<id>
            let mut kind = segments.next();
            if kind.is_some_and(|k| k.starts_with("intl-")) {
                kind = segments.next();
            }
            if let (Some(kind), Some(id)) = (kind.and_then(|k| k.parse().ok()), segments.next()) {
                return (Some(kind), id.to_string());
            }
        }

        (None, input.to_string())
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElementKind {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "track" => Ok(Self::Track),
            "album" => Ok(Self::Album),
            "artist" => Ok(Self::Artist),
            "playlist" => Ok(Self::Playlist),
            other => Err(SourceError::parse(
                SOURCE,
                format!("unknown element kind '{other}'"),
            )),
        }
    }
}

/// A catalog element resolved from an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogElement {
    Track(TrackReference),
    Album {
        id: String,
        name: String,
        artists: Vec<String>,
        total_tracks: u32,
    },
    Artist {
        id: String,
        name: String,
        genres: Vec<String>,
    },
    Playlist {
        id: String,
        name: String,
        owner: Option<String>,
        total_tracks: u32,
    },
}

impl CatalogElement {
    pub const fn kind(&self) -> ElementKind {
        match self {
            Self::Track(_) => ElementKind::Track,
            Self::Album { .. } => ElementKind::Album,
            Self::Artist { .. } => ElementKind::Artist,
            Self::Playlist { .. } => ElementKind::Playlist,
        }
    }
}

impl fmt::Display for CatalogElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Track(track) => write!(f, "track {track}"),
            Self::Album {
                name,
                artists,
                total_tracks,
                ..
            } => write!(
                f,
                "album {name} - {} ({total_tracks} tracks)",
                artists.join(", ")
            ),
            Self::Artist { name, genres, .. } if genres.is_empty() => write!(f, "artist {name}"),
            Self::Artist { name, genres, .. } => {
                write!(f, "artist {name} [{}]", genres.join(", "))
            }
            Self::Playlist {
                name,
                owner,
                total_tracks,
                ..
            } => write!(
                f,
                "playlist {name} by {} ({total_tracks} tracks)",
                owner.as_deref().unwrap_or("unknown")
            ),
        }
    }
}

/// Outcome of looking an id up as one element kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KindLookup<T> {
    Found(T),
    NotThisKind,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct AppToken {
    value: String,
    expires_at: Instant,
}

/// Spotify Web API client.
#[derive(Debug)]
pub struct SpotifyClient {
    http: Client,
    client_id: Option<String>,
    client_secret: Option<String>,
    user_token: Option<String>,
    app_token: Mutex<Option<AppToken>>,
}

impl SpotifyClient {
    /// Create a client. Any credential may be absent; operations that
    /// need a missing one fail with [`SourceError::MissingCredential`].
    pub fn new(
        client_id: Option<String>,
        client_secret: Option<String>,
        user_token: Option<String>,
        timeout: Duration,
    ) -> SourceResult<Self> {
        Ok(Self {
            http: http_client(timeout)?,
            client_id,
            client_secret,
            user_token,
            app_token: Mutex::new(None),
        })
    }

    async fn fetch_app_token(&self, id: &str, secret: &str) -> SourceResult<AppToken> {
        let basic = STANDARD.encode(format!("{id}:{secret}"));
        let response = self
            .http
            .post(TOKEN_URL)
            .header("Authorization", format!("Basic {basic}"))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| SourceError::transport(SOURCE, e))?;
        let response = check_status(SOURCE, "token", response).await?;
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| SourceError::parse(SOURCE, e))?;

        log::debug!("Obtained Spotify app token valid for {}s", token.expires_in);
        Ok(AppToken {
            value: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        })
    }

    /// Token for catalog reads: the app token when client credentials are
    /// configured, otherwise the user token.
    async fn read_token(&self) -> SourceResult<String> {
        let (Some(id), Some(secret)) = (&self.client_id, &self.client_secret) else {
            return self.user_token().map(str::to_string).map_err(|_| {
                SourceError::MissingCredential {
                    source_name: SOURCE.to_string(),
                    key: "spotify_client_id/spotify_client_secret",
                }
            });
        };

        let mut cached = self.app_token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() + TOKEN_MARGIN {
                return Ok(token.value.clone());
            }
        }

        let token = self.fetch_app_token(id, secret).await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    fn user_token(&self) -> SourceResult<&str> {
        self.user_token
            .as_deref()
            .ok_or_else(|| SourceError::MissingCredential {
                source_name: SOURCE.to_string(),
                key: "spotify_user_token",
            })
    }

    async fn send(&self, entity: &str, request: RequestBuilder) -> SourceResult<reqwest::Response> {
        let response = request
            .send()
            .await
            .map_err(|e| SourceError::transport(SOURCE, e))?;
        check_status(SOURCE, entity, response).await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        entity: &str,
        url: &str,
    ) -> SourceResult<T> {
        let token = self.read_token().await?;
        let response = self.send(entity, self.http.get(url).bearer_auth(token)).await?;
        response
            .json()
            .await
            .map_err(|e| SourceError::parse(SOURCE, e))
    }

    /// Look up a single track by id.
    pub async fn get_track(&self, track_id: &str) -> SourceResult<Option<TrackReference>> {
        let url = format!("{API_BASE}/tracks/{track_id}");
        match self.get_json::<TrackObject>("track", &url).await {
            Ok(track) => Ok(track.into_reference()),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Fetch `id` as one element kind.
    ///
    /// 404 and 400 mean the id is not of this kind; any other error is
    /// returned as is.
    pub async fn lookup_as(
        &self,
        id: &str,
        kind: ElementKind,
    ) -> SourceResult<KindLookup<CatalogElement>> {
        let url = format!("{API_BASE}/{}/{id}", kind.path());
        let fetched = match kind {
            ElementKind::Track => self
                .get_json::<TrackObject>(kind.as_str(), &url)
                .await
                .map(|t| t.into_reference().map(CatalogElement::Track)),
            ElementKind::Album => self
                .get_json::<AlbumObject>(kind.as_str(), &url)
                .await
                .map(|a| {
                    Some(CatalogElement::Album {
                        id: a.id,
                        name: a.name,
                        artists: a.artists.into_iter().map(|n| n.name).collect(),
                        total_tracks: a.total_tracks,
                    })
                }),
            ElementKind::Artist => self
                .get_json::<ArtistObject>(kind.as_str(), &url)
                .await
                .map(|a| {
                    Some(CatalogElement::Artist {
                        id: a.id,
                        name: a.name,
                        genres: a.genres,
                    })
                }),
            ElementKind::Playlist => self
                .get_json::<PlaylistObject>(kind.as_str(), &url)
                .await
                .map(|p| {
                    Some(CatalogElement::Playlist {
                        id: p.id,
                        name: p.name,
                        owner: p.owner.display_name,
                        total_tracks: p.tracks.total,
                    })
                }),
        };

        match fetched {
            Ok(Some(element)) => Ok(KindLookup::Found(element)),
            Ok(None) => Ok(KindLookup::NotThisKind),
            Err(e) if is_wrong_kind(&e) => Ok(KindLookup::NotThisKind),
            Err(e) => Err(e),
        }
    }

    /// Resolve an id to a catalog element.
    ///
    /// With a known kind this is a single request. Otherwise each kind in
    /// [`ElementKind::LOOKUP_ORDER`] is tried until one matches.
    pub async fn describe(
        &self,
        id: &str,
        kind: Option<ElementKind>,
    ) -> SourceResult<Option<CatalogElement>> {
        let kinds = match kind {
            Some(kind) => vec![kind],
            None => ElementKind::LOOKUP_ORDER.to_vec(),
        };

        for kind in kinds {
            match self.lookup_as(id, kind).await? {
                KindLookup::Found(element) => return Ok(Some(element)),
                KindLookup::NotThisKind => log::debug!("{id} is not a {kind}"),
            }
        }
        Ok(None)
    }

    async fn user_get_json<T: serde::de::DeserializeOwned>(
        &self,
        entity: &str,
        url: &str,
    ) -> SourceResult<T> {
        let token = self.user_token()?;
        let response = self.send(entity, self.http.get(url).bearer_auth(token)).await?;
        response
            .json()
            .await
            .map_err(|e| SourceError::parse(SOURCE, e))
    }

    /// Id of the user the user token belongs to.
    async fn current_user_id(&self) -> SourceResult<String> {
        let user: UserObject = self.user_get_json("user", &format!("{API_BASE}/me")).await?;
        Ok(user.id)
    }

    async fn put_or_post_tracks(
        &self,
        playlist_id: &str,
        uris: &[String],
        replace: bool,
    ) -> SourceResult<()> {
        let token = self.user_token()?;
        let url = format!("{API_BASE}/playlists/{playlist_id}/tracks");
        let request = if replace {
            self.http.put(&url)
        } else {
            self.http.post(&url)
        };
        self.send(
            "playlist",
            request.bearer_auth(token).json(&json!({ "uris": uris })),
        )
        .await?;
        Ok(())
    }
}

fn is_wrong_kind(err: &SourceError) -> bool {
    matches!(
        err,
        SourceError::NotFound { .. }
            | SourceError::Http {
                status: Some(400),
                ..
            }
    )
}

#[async_trait]
impl CatalogSearch for SpotifyClient {
    async fn search_track(
        &self,
        title: &str,
        artist: &str,
    ) -> SourceResult<Option<TrackReference>> {
        let token = self.read_token().await?;
        let query = format!("track:{title} artist:{artist}");
        let request = self
            .http
            .get(format!("{API_BASE}/search"))
            .bearer_auth(token)
            .query(&[("q", query.as_str()), ("type", "track"), ("limit", "1")]);

        let response = self.send("track", request).await?;
        let result: SearchResponse = response
            .json()
            .await
            .map_err(|e| SourceError::parse(SOURCE, e))?;

        Ok(result
            .tracks
            .items
            .into_iter()
            .find_map(TrackObject::into_reference))
    }
}

#[async_trait]
impl PlaylistEditor for SpotifyClient {
    async fn replace_playlist(&self, playlist_id: &str, uris: &[String]) -> SourceResult<()> {
        self.put_or_post_tracks(playlist_id, uris, true).await
    }

    async fn append_to_playlist(&self, playlist_id: &str, uris: &[String]) -> SourceResult<()> {
        self.put_or_post_tracks(playlist_id, uris, false).await
    }

    async fn queue(&self, uri: &str) -> SourceResult<()> {
        let token = self.user_token()?;
        let request = self
            .http
            .post(format!("{API_BASE}/me/player/queue"))
            .bearer_auth(token)
            .query(&[("uri", uri)]);
        self.send("player", request).await?;
        Ok(())
    }

    async fn create_playlist(&self, name: &str) -> SourceResult<String> {
        let token = self.user_token()?;
        let user_id = self.current_user_id().await?;
        let request = self
            .http
            .post(format!("{API_BASE}/users/{user_id}/playlists"))
            .bearer_auth(token)
            .json(&json!({ "name": name, "public": false, "collaborative": false }));
        let created: CreatedPlaylist = self
            .send("playlist", request)
            .await?
            .json()
            .await
            .map_err(|e| SourceError::parse(SOURCE, e))?;
        log::info!("Created playlist {name} ({})", created.id);
        Ok(created.id)
    }

    async fn find_user_playlist(&self, name: &str) -> SourceResult<Option<String>> {
        let user_id = self.current_user_id().await?;
        let mut next = Some(format!("{API_BASE}/me/playlists?limit=50"));

        while let Some(url) = next {
            let page: PlaylistPage = self.user_get_json("playlist", &url).await?;
            if let Some(id) = page.find_owned(name, &user_id) {
                return Ok(Some(id));
            }
            next = page.next;
        }
        Ok(None)
    }
}
