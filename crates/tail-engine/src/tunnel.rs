//! SSH 터널
//!
//! 검색 엔진이 SSH 서버 뒤에 있을 때 `ssh -N -L`로 로컬 포트를 포워딩합니다.
//! 터널은 별도 태스크에서 실행되고, 로컬 포트가 TCP 연결을 받기 시작하면
//! oneshot 채널로 준비 완료를 알립니다.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::process::Command;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::backend::elastic::normalize_url;
use crate::error::TailError;

/// 준비 확인 간격
const PROBE_INTERVAL: Duration = Duration::from_millis(100);
/// 포워딩 대상 로컬 주소
const LOCAL_HOST: &str = "127.0.0.1";

/// SSH 접속 대상 (`[user@]host[:port]`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    /// 로그인 사용자
    pub user: Option<String>,
    /// SSH 서버 호스트
    pub host: String,
    /// SSH 포트
    pub port: Option<u16>,
}

impl SshTarget {
    /// ssh 명령의 접속 대상 인자 (`user@host` 또는 `host`)
    pub fn destination(&self) -> String {
        match &self.user {
            Some(user) => format!("{user}@{}", self.host),
            None => self.host.clone(),
        }
    }
}

impl FromStr for SshTarget {
    type Err = TailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (user, rest) = match s.rsplit_once('@') {
            Some((user, rest)) if !user.is_empty() => (Some(user.to_owned()), rest),
            Some(_) => return Err(TailError::Tunnel(format!("empty user in ssh target '{s}'"))),
            None => (None, s),
        };

        let (host, port) = match rest.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse::<u16>().map_err(|e| {
                    TailError::Tunnel(format!("invalid ssh port in '{s}': {e}"))
                })?;
                (host, Some(port))
            }
            None => (rest, None),
        };

        if host.is_empty() {
            return Err(TailError::Tunnel(format!("empty host in ssh target '{s}'")));
        }

        Ok(Self {
            user,
            host: host.to_owned(),
            port,
        })
    }
}

impl fmt::Display for SshTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.destination())?;
        if let Some(port) = self.port {
            write!(f, ":{port}")?;
        }
        Ok(())
    }
}

/// SSH 터널 생성기
#[derive(Debug, Clone)]
pub struct SshTunnel {
    target: SshTarget,
    program: String,
    ready_timeout: Duration,
}

impl SshTunnel {
    /// `[user@]host[:port]` 형식의 SSH 대상으로 터널 생성기를 만듭니다.
    pub fn new(target: &str) -> Result<Self, TailError> {
        Ok(Self {
            target: target.parse()?,
            program: "ssh".to_owned(),
            ready_timeout: Duration::from_secs(10),
        })
    }

    /// 실행할 ssh 바이너리를 지정합니다.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// 준비 대기 시간을 지정합니다.
    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    /// SSH 대상
    pub fn target(&self) -> &SshTarget {
        &self.target
    }

    /// 빈 로컬 포트에서 `remote`(`host:port`)로 포워딩하는 터널을 시작합니다.
    ///
    /// 반환 즉시 터널이 준비된 것은 아니며, [`TunnelHandle::ready`]를 기다려야 합니다.
    pub async fn spawn(&self, remote: &str) -> Result<TunnelHandle, TailError> {
        let local_port = free_local_port().await?;
        let forward = format!("{LOCAL_HOST}:{local_port}:{remote}");

        let mut command = Command::new(&self.program);
        command
            .arg("-N")
            .arg("-o")
            .arg("ExitOnForwardFailure=yes")
            .arg("-L")
            .arg(&forward);
        if let Some(port) = self.target.port {
            command.arg("-p").arg(port.to_string());
        }
        command.arg(self.target.destination()).kill_on_drop(true);

        let mut child = command.spawn().map_err(|e| {
            TailError::Tunnel(format!("failed to start '{}': {e}", self.program))
        })?;
        info!(ssh = %self.target, forward = %forward, "ssh tunnel starting");

        let (ready_tx, ready_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let ready_timeout = self.ready_timeout;

        let task = tokio::spawn(async move {
            let outcome = tokio::select! {
                status = child.wait() => Err(TailError::Tunnel(match status {
                    Ok(status) => format!("ssh exited before the tunnel was ready ({status})"),
                    Err(e) => format!("failed to wait for ssh: {e}"),
                })),
                ready = wait_for_port(local_port, ready_timeout) => ready.map(|()| local_port),
            };

            let failed = outcome.is_err();
            if ready_tx.send(outcome).is_err() {
                debug!("tunnel readiness receiver dropped");
            }
            if failed {
                if let Err(e) = child.kill().await {
                    debug!(error = %e, "failed to kill ssh");
                }
                return;
            }

            tokio::select! {
                status = child.wait() => {
                    warn!(status = ?status, "ssh tunnel exited");
                }
                _ = shutdown_rx => {
                    if let Err(e) = child.kill().await {
                        debug!(error = %e, "failed to kill ssh");
                    }
                    debug!("ssh tunnel closed");
                }
            }
        });

        Ok(TunnelHandle {
            local_port,
            ready: Some(ready_rx),
            is_ready: false,
            shutdown: Some(shutdown_tx),
            task,
        })
    }
}

/// 실행 중인 터널 핸들
///
/// 핸들이 드롭되어도 런타임 종료 시 ssh 프로세스가 함께 종료됩니다.
pub struct TunnelHandle {
    local_port: u16,
    ready: Option<oneshot::Receiver<Result<u16, TailError>>>,
    is_ready: bool,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl TunnelHandle {
    /// 포워딩된 로컬 포트
    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    /// 터널이 연결을 받을 수 있을 때까지 기다리고 로컬 포트를 반환합니다.
    pub async fn ready(&mut self) -> Result<u16, TailError> {
        match self.ready.take() {
            Some(rx) => {
                let port = rx.await.map_err(|_| {
                    TailError::Tunnel("tunnel task ended before reporting readiness".to_owned())
                })??;
                self.is_ready = true;
                info!(local_port = port, "ssh tunnel ready");
                Ok(port)
            }
            None if self.is_ready => Ok(self.local_port),
            None => Err(TailError::Tunnel("tunnel failed to become ready".to_owned())),
        }
    }

    /// 터널을 닫고 ssh 프로세스를 종료합니다.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            // 이미 종료된 태스크면 수신자가 없음
            let _ = tx.send(());
        }
        if let Err(e) = self.task.await {
            debug!(error = %e, "tunnel task join failed");
        }
    }
}

/// 사용 가능한 로컬 포트를 하나 얻습니다.
pub async fn free_local_port() -> Result<u16, TailError> {
    let listener = TcpListener::bind((LOCAL_HOST, 0))
        .await
        .map_err(|e| TailError::Tunnel(format!("failed to find a free local port: {e}")))?;
    let port = listener
        .local_addr()
        .map_err(|e| TailError::Tunnel(format!("failed to read local port: {e}")))?
        .port();
    Ok(port)
}

/// 로컬 포트가 TCP 연결을 받을 때까지 기다립니다.
pub async fn wait_for_port(port: u16, timeout: Duration) -> Result<(), TailError> {
    let probe = async {
        loop {
            match TcpStream::connect((LOCAL_HOST, port)).await {
                Ok(_) => return,
                Err(e) => debug!(port, error = %e, "tunnel port not ready yet"),
            }
            tokio::time::sleep(PROBE_INTERVAL).await;
        }
    };

    tokio::time::timeout(timeout, probe).await.map_err(|_| {
        TailError::Tunnel(format!(
            "local port {port} not ready after {}ms",
            timeout.as_millis()
        ))
    })
}

/// 검색 엔진 URL에서 터널이 포워딩할 `host:port`를 추출합니다.
pub fn remote_endpoint(url: &str) -> String {
    let normalized = normalize_url(url);
    let (_, authority, _) = split_url(&normalized);
    authority.to_owned()
}

/// 검색 엔진 URL의 호스트를 터널 로컬 포트로 바꾼 URL을 만듭니다.
pub fn tunnel_url(url: &str, local_port: u16) -> String {
    let normalized = normalize_url(url);
    let (scheme, _, path) = split_url(&normalized);
    match path {
        Some(path) => format!("{scheme}://{LOCAL_HOST}:{local_port}/{path}"),
        None => format!("{scheme}://{LOCAL_HOST}:{local_port}"),
    }
}

/// 정규화된 URL을 (스킴, 사용자 정보를 뺀 host:port, 경로)로 나눕니다.
fn split_url(normalized: &str) -> (&str, &str, Option<&str>) {
    let (scheme, rest) = normalized.split_once("://").unwrap_or(("http", normalized));
    let (authority, path) = match rest.split_once('/') {
        Some((authority, path)) => (authority, Some(path)),
        None => (rest, None),
    };
    let host_port = authority.rsplit_once('@').map_or(authority, |(_, h)| h);
    (scheme, host_port, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_target() {
        let t: SshTarget = "deploy@bastion.example.com:2222".parse().unwrap();
        assert_eq!(t.user.as_deref(), Some("deploy"));
        assert_eq!(t.host, "bastion.example.com");
        assert_eq!(t.port, Some(2222));
        assert_eq!(t.destination(), "deploy@bastion.example.com");
        assert_eq!(t.to_string(), "deploy@bastion.example.com:2222");
    }

    #[test]
    fn parses_host_only() {
        let t: SshTarget = "bastion".parse().unwrap();
        assert_eq!(t.user, None);
        assert_eq!(t.port, None);
        assert_eq!(t.destination(), "bastion");
    }

    #[test]
    fn rejects_bad_targets() {
        assert!("".parse::<SshTarget>().is_err());
        assert!("@host".parse::<SshTarget>().is_err());
        assert!("host:notaport".parse::<SshTarget>().is_err());
        assert!("user@:22".parse::<SshTarget>().is_err());
    }

    #[test]
    fn remote_endpoint_uses_default_port() {
        assert_eq!(remote_endpoint("es.internal"), "es.internal:9200");
        assert_eq!(remote_endpoint("https://u:p@es.internal:9243/x"), "es.internal:9243");
    }

    #[test]
    fn tunnel_url_keeps_scheme_and_path() {
        assert_eq!(tunnel_url("es.internal", 41000), "http://127.0.0.1:41000");
        assert_eq!(
            tunnel_url("https://es.internal:9243/proxy", 41000),
            "https://127.0.0.1:41000/proxy"
        );
    }

    #[tokio::test]
    async fn free_port_is_nonzero() {
        assert_ne!(free_local_port().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn wait_for_port_succeeds_when_listening() {
        let listener = TcpListener::bind((LOCAL_HOST, 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        wait_for_port(port, Duration::from_secs(2)).await.unwrap();
    }

    #[tokio::test]
    async fn wait_for_port_times_out_when_closed() {
        let port = free_local_port().await.unwrap();
        let err = wait_for_port(port, Duration::from_millis(250))
            .await
            .unwrap_err();
        assert!(matches!(err, TailError::Tunnel(_)));
    }

    #[tokio::test]
    async fn spawn_fails_for_missing_program() {
        let tunnel = SshTunnel::new("bastion")
            .unwrap()
            .with_program("/nonexistent/logtail-ssh");
        let err = tunnel.spawn("es.internal:9200").await.err().unwrap();
        assert!(matches!(err, TailError::Tunnel(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn ready_fails_when_ssh_exits_early() {
        let tunnel = SshTunnel::new("bastion")
            .unwrap()
            .with_program("false")
            .with_ready_timeout(Duration::from_secs(5));
        let mut handle = tunnel.spawn("es.internal:9200").await.unwrap();
        let err = handle.ready().await.unwrap_err();
        assert!(err.to_string().contains("ssh exited"));
        assert!(handle.ready().await.is_err());
        handle.shutdown().await;
    }
}
