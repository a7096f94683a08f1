//! The SMB1 client: connection handshake and file-oriented verbs.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use smb1_msg::create::{CreateOptions, DesiredAccess, NtCreateAndxRequest, NtCreateAndxResponse};
use smb1_msg::{
    ntlm, parse_both_directory_entries, CloseRequest, DeleteDirectoryRequest, DeleteRequest,
    EchoRequest, EchoResponse, FindFirst2Params, FindFirst2ResponseParams, FindNext2Params,
    FindNext2ResponseParams, FsSizeInfo, LogoffAndxRequest, NegotiateRequest, NegotiateResponse,
    ReadAndxRequest, ReadAndxResponse, RenameRequest, SessionSetupAndxRequest,
    SessionSetupAndxResponse, Status, Trans2Subcommand, Transaction2Request,
    Transaction2Response, TreeConnectAndxRequest, TreeConnectAndxResponse, TreeDisconnectRequest,
    WriteAndxRequest, WriteAndxResponse,
};
use smb1_transport::NetBiosName;

use crate::config::ClientConfig;
use crate::connection::{Connection, ConnectionState};
use crate::error::{Error, Result};
use crate::path::{listing_pattern, validate_path};
use crate::resource::{
    default_file_attributes, default_share_access, directory_create_options,
    file_create_options, Access, DirectoryEntry, DiskInfo, Disposition, FileHandle,
};

/// A client for one microSD Management server. One outstanding request at a
/// time; not shareable across concurrent callers.
pub struct Client {
    ip: Ipv4Addr,
    server_name: String,
    config: ClientConfig,
    connection: Option<Connection>,
}

impl Client {
    pub fn new(ip: Ipv4Addr, server_name: &str) -> Self {
        Self::with_config(ip, server_name, ClientConfig::default())
    }

    pub fn with_config(ip: Ipv4Addr, server_name: &str, config: ClientConfig) -> Self {
        Self {
            ip,
            server_name: server_name.to_string(),
            config,
            connection: None,
        }
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    pub fn ip(&self) -> Ipv4Addr {
        self.ip
    }

    pub fn state(&self) -> ConnectionState {
        self.connection
            .as_ref()
            .map(Connection::state)
            .unwrap_or(ConnectionState::Closed)
    }

    /// Runs the full connection sequence: TCP, NBSS session request,
    /// NEGOTIATE, SESSION_SETUP_ANDX, TREE_CONNECT_ANDX.
    pub async fn connect(&mut self) -> Result<()> {
        if self.state() != ConnectionState::Closed {
            return Err(Error::InvalidState {
                operation: "connect",
                state: self.state(),
            });
        }

        let addr = SocketAddr::new(IpAddr::V4(self.ip), self.config.port);
        let mut conn = Connection::open(addr, self.config.timeout).await?;

        let called = NetBiosName::file_server(&self.server_name)?;
        let calling = NetBiosName::workstation(&self.config.client_name)?;
        conn.request_session(&called, &calling).await?;

        self.negotiate(&mut conn).await?;
        self.session_setup(&mut conn).await?;
        self.tree_connect(&mut conn).await?;

        log::info!(
            "Connected to \\\\{}\\{} at {}",
            self.server_name,
            self.config.share,
            self.ip
        );
        self.connection = Some(conn);
        Ok(())
    }

    async fn negotiate(&self, conn: &mut Connection) -> Result<()> {
        let response = conn
            .send_recv(&NegotiateRequest::default())
            .await?
            .expect_success()?;
        let negotiate = NegotiateResponse::parse(&response.words, &response.data)?;

        if negotiate.words.dialect_index != 0 {
            conn.abort();
            return Err(Error::Protocol(format!(
                "server selected dialect index {}, expected 0 ({})",
                negotiate.words.dialect_index,
                smb1_msg::negotiate::NT_LM_0_12,
            )));
        }
        log::debug!(
            "Negotiated {}: max buffer {} bytes, capabilities {:?}",
            smb1_msg::negotiate::NT_LM_0_12,
            negotiate.words.max_buffer_size,
            negotiate.words.capabilities
        );
        conn.mark_negotiated(negotiate.words.max_buffer_size);
        Ok(())
    }

    async fn session_setup(&self, conn: &mut Connection) -> Result<()> {
        let request =
            SessionSetupAndxRequest::new(ntlm::negotiate_blob(), self.config.max_buffer_size);
        let response = conn.send_recv(&request).await?;

        // The server ignores the NTLM token, so a single round trip ends in
        // Success. MORE_PROCESSING_REQUIRED still carries a valid UID and is
        // accepted too; nothing useful could be sent in a second leg anyway.
        let status = response.status();
        if status != Status::U32_SUCCESS
            && Status::try_from(status) != Ok(Status::MoreProcessingRequired)
        {
            return Err(Error::ServerStatus {
                command: response.header.command,
                status,
            });
        }

        let setup = SessionSetupAndxResponse::parse(&response.words)?;
        if setup.logged_in_as_guest() {
            log::debug!("Server flagged the session as guest");
        }
        conn.mark_authed(response.header.uid);
        Ok(())
    }

    async fn tree_connect(&self, conn: &mut Connection) -> Result<()> {
        let request = TreeConnectAndxRequest::new(&self.server_name, &self.config.share);
        let response = conn.send_recv(&request).await?.expect_success()?;
        TreeConnectAndxResponse::parse(&response.words)?;
        conn.mark_ready(response.header.tid);
        Ok(())
    }

    /// Best-effort protocol goodbye, then closes the socket.
    pub async fn close(&mut self) {
        if let Some(mut conn) = self.connection.take() {
            if conn.state() == ConnectionState::Ready {
                if let Err(e) = conn.send_recv(&TreeDisconnectRequest).await {
                    log::debug!("Tree disconnect failed: {e}");
                }
            }
            if matches!(
                conn.state(),
                ConnectionState::Authed | ConnectionState::Ready
            ) {
                if let Err(e) = conn.send_recv(&LogoffAndxRequest).await {
                    log::debug!("Logoff failed: {e}");
                }
            }
            conn.close().await;
        }
    }

    fn ready_connection(&mut self, operation: &'static str) -> Result<&mut Connection> {
        match self.connection.as_mut() {
            Some(conn) if conn.state() == ConnectionState::Ready => Ok(conn),
            Some(conn) => Err(Error::InvalidState {
                operation,
                state: conn.state(),
            }),
            None => Err(Error::InvalidState {
                operation,
                state: ConnectionState::Closed,
            }),
        }
    }

    fn max_transaction_data(conn: &Connection) -> u16 {
        conn.max_buffer_size()
            .saturating_sub(Connection::TRANSACTION_OVERHEAD)
            .clamp(1024, u16::MAX as u32) as u16
    }

    /// Lists a directory, filtering `.` and `..`.
    pub async fn listdir(&mut self, path: &str) -> Result<Vec<DirectoryEntry>> {
        validate_path(path)?;
        let pattern = listing_pattern(path);
        let batch = self.config.find_batch_size;
        let conn = self.ready_connection("list a directory")?;
        let max_data = Self::max_transaction_data(conn);

        let params = FindFirst2Params::new(&pattern, batch).to_bytes()?;
        let request = Transaction2Request::new(Trans2Subcommand::FindFirst2, params, max_data);
        let response = match conn.send_recv(&request).await?.expect_success() {
            Ok(response) => response,
            // An empty match set is an empty listing, not a failure.
            Err(e) if e.is_status(Status::NoSuchFile) => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let t2 = Transaction2Response::parse(&response.words, &response.raw)?;
        let first = FindFirst2ResponseParams::parse(&t2.parameters)?;
        let mut raw_entries =
            parse_both_directory_entries(&t2.data, first.search_count as usize)?;
        let mut end_of_search = first.end_of_search != 0 || first.search_count == 0;
        let sid = first.sid;

        while !end_of_search {
            let resume_from = match raw_entries.last() {
                Some(entry) => entry.name()?,
                None => break,
            };
            let params = FindNext2Params::new(sid, batch, &resume_from).to_bytes()?;
            let request = Transaction2Request::new(Trans2Subcommand::FindNext2, params, max_data);
            let response = match conn.send_recv(&request).await?.expect_success() {
                Ok(response) => response,
                Err(e) if e.is_status(Status::NoMoreFiles) => break,
                Err(e) => return Err(e),
            };

            let t2 = Transaction2Response::parse(&response.words, &response.raw)?;
            let next = FindNext2ResponseParams::parse(&t2.parameters)?;
            if next.search_count == 0 {
                break;
            }
            raw_entries.extend(parse_both_directory_entries(
                &t2.data,
                next.search_count as usize,
            )?);
            end_of_search = next.end_of_search != 0;
        }

        let mut entries = Vec::with_capacity(raw_entries.len());
        for entry in &raw_entries {
            let name = entry.name()?;
            if name == "." || name == ".." {
                continue;
            }
            entries.push(DirectoryEntry {
                name,
                size: entry.end_of_file,
                is_dir: entry.file_attributes.directory(),
                attributes: u32::from_le_bytes(entry.file_attributes.into_bytes()),
                mtime: entry.last_write_time.raw(),
            });
        }
        log::debug!("Listed {path}: {} entries", entries.len());
        Ok(entries)
    }

    /// Opens (or creates) a file or directory per the given access and
    /// disposition. The returned handle carries `is_dir` and `end_of_file`
    /// from the create response.
    pub async fn open(
        &mut self,
        path: &str,
        access: Access,
        disposition: Disposition,
    ) -> Result<FileHandle> {
        validate_path(path)?;
        self.create(
            path,
            access.desired_access(),
            disposition,
            CreateOptions::new(),
        )
        .await
        .map(|response| FileHandle::from_response(&response))
    }

    async fn create(
        &mut self,
        path: &str,
        desired_access: DesiredAccess,
        disposition: Disposition,
        create_options: CreateOptions,
    ) -> Result<NtCreateAndxResponse> {
        let request = NtCreateAndxRequest {
            path: path.to_string(),
            desired_access,
            file_attributes: default_file_attributes(),
            share_access: default_share_access(),
            create_disposition: disposition.create_disposition(),
            create_options,
        };
        let conn = self.ready_connection("open a file")?;
        let response = conn.send_recv(&request).await?.expect_success()?;
        Ok(NtCreateAndxResponse::parse(&response.words)?)
    }

    /// Reads up to `length` bytes at `offset`. Reading at or past the end
    /// of the file yields an empty buffer.
    pub async fn read(&mut self, handle: &FileHandle, offset: u64, length: usize) -> Result<Vec<u8>> {
        let conn = self.ready_connection("read")?;
        if length > conn.max_io_chunk() {
            return Err(Error::InvalidArgument(format!(
                "read of {length} bytes exceeds the {} byte negotiated chunk",
                conn.max_io_chunk()
            )));
        }
        let request = ReadAndxRequest {
            fid: handle.fid,
            offset,
            length: length as u16,
        };
        match conn.send_recv(&request).await?.expect_success() {
            Ok(response) => Ok(ReadAndxResponse::parse(&response.words, &response.raw)?.data),
            Err(e) if e.is_status(Status::EndOfFile) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    /// Writes `payload` at `offset`, returning the byte count the server
    /// accepted.
    pub async fn write(&mut self, handle: &FileHandle, offset: u64, payload: &[u8]) -> Result<u32> {
        let conn = self.ready_connection("write")?;
        if payload.len() > conn.max_io_chunk() {
            return Err(Error::InvalidArgument(format!(
                "write of {} bytes exceeds the {} byte negotiated chunk",
                payload.len(),
                conn.max_io_chunk()
            )));
        }
        let request = WriteAndxRequest {
            fid: handle.fid,
            offset,
            payload: payload.to_vec(),
        };
        let response = conn.send_recv(&request).await?.expect_success()?;
        Ok(WriteAndxResponse::parse(&response.words)?.bytes_written())
    }

    /// Releases a FID. Always attempted on error paths.
    pub async fn close_file(&mut self, handle: &FileHandle) -> Result<()> {
        let conn = self.ready_connection("close a file")?;
        conn.send_recv(&CloseRequest { fid: handle.fid })
            .await?
            .expect_success()?;
        Ok(())
    }

    /// Downloads a file into `sink`, chunked to the negotiated buffer size.
    pub async fn get_file<W>(&mut self, path: &str, sink: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin,
    {
        let handle = self
            .open(path, Access::Read, Disposition::OpenExisting)
            .await?;
        if handle.is_dir {
            let result = Err(Error::InvalidArgument(format!(
                "{path:?} is a directory"
            )));
            return self.finish_handle(handle, result).await;
        }
        let result = self.copy_to_sink(&handle, sink).await;
        self.finish_handle(handle, result).await
    }

    async fn copy_to_sink<W>(&mut self, handle: &FileHandle, sink: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin,
    {
        let chunk = self
            .ready_connection("transfer a file")?
            .max_io_chunk();
        let mut offset = 0u64;
        while offset < handle.end_of_file {
            let want = (handle.end_of_file - offset).min(chunk as u64) as usize;
            let data = self.read(handle, offset, want).await?;
            if data.is_empty() {
                break;
            }
            sink.write_all(&data).await?;
            offset += data.len() as u64;
        }
        sink.flush().await?;
        Ok(offset)
    }

    /// Uploads from `source`, truncating any existing file at `path`.
    pub async fn put_file<R>(&mut self, path: &str, source: &mut R) -> Result<u64>
    where
        R: AsyncRead + Unpin,
    {
        validate_path(path)?;
        let handle = self
            .create(
                path,
                Access::Write.desired_access(),
                Disposition::OverwriteIf,
                file_create_options(),
            )
            .await
            .map(|response| FileHandle::from_response(&response))?;
        let result = self.copy_from_source(&handle, source).await;
        self.finish_handle(handle, result).await
    }

    async fn copy_from_source<R>(&mut self, handle: &FileHandle, source: &mut R) -> Result<u64>
    where
        R: AsyncRead + Unpin,
    {
        let chunk = self
            .ready_connection("transfer a file")?
            .max_io_chunk();
        let mut buffer = vec![0u8; chunk];
        let mut offset = 0u64;
        loop {
            let n = source.read(&mut buffer).await?;
            if n == 0 {
                return Ok(offset);
            }
            let mut written = 0usize;
            while written < n {
                let accepted = self.write(handle, offset, &buffer[written..n]).await?;
                if accepted == 0 {
                    return Err(Error::Protocol("server accepted a zero-byte write".into()));
                }
                written += accepted as usize;
                offset += accepted as u64;
            }
        }
    }

    /// Closes `handle` after a transfer, preserving the transfer error if
    /// there was one.
    async fn finish_handle(&mut self, handle: FileHandle, result: Result<u64>) -> Result<u64> {
        match result {
            Ok(n) => {
                self.close_file(&handle).await?;
                Ok(n)
            }
            Err(e) => {
                if let Err(close_err) = self.close_file(&handle).await {
                    log::debug!("Cleanup close of FID {} failed: {close_err}", handle.fid);
                }
                Err(e)
            }
        }
    }

    /// Creates a directory.
    pub async fn mkdir(&mut self, path: &str) -> Result<()> {
        validate_path(path)?;
        let response = self
            .create(
                path,
                DesiredAccess::new().with_read_attributes(true),
                Disposition::CreateNew,
                directory_create_options(),
            )
            .await?;
        let handle = FileHandle::from_response(&response);
        self.close_file(&handle).await
    }

    /// Removes an empty directory.
    pub async fn rmdir(&mut self, path: &str) -> Result<()> {
        validate_path(path)?;
        let conn = self.ready_connection("remove a directory")?;
        conn.send_recv(&DeleteDirectoryRequest::new(path))
            .await?
            .expect_success()?;
        Ok(())
    }

    /// Deletes a file.
    pub async fn delete(&mut self, path: &str) -> Result<()> {
        validate_path(path)?;
        let conn = self.ready_connection("delete a file")?;
        conn.send_recv(&DeleteRequest::new(path))
            .await?
            .expect_success()?;
        Ok(())
    }

    /// Renames a file or directory.
    pub async fn rename(&mut self, old_path: &str, new_path: &str) -> Result<()> {
        validate_path(old_path)?;
        validate_path(new_path)?;
        let conn = self.ready_connection("rename")?;
        conn.send_recv(&RenameRequest::new(old_path, new_path))
            .await?
            .expect_success()?;
        Ok(())
    }

    /// Liveness probe: round-trips a random payload through SMB_COM_ECHO.
    pub async fn echo(&mut self) -> Result<()> {
        let payload: [u8; 16] = rand::random();
        let conn = self.ready_connection("echo")?;
        let response = conn
            .send_recv(&EchoRequest::new(payload.to_vec()))
            .await?
            .expect_success()?;
        EchoResponse::parse(&response.words)?;
        if response.data != payload {
            return Err(Error::Protocol("echo payload mismatch".into()));
        }
        Ok(())
    }

    /// Queries total/free capacity of the share.
    pub async fn disk_info(&mut self) -> Result<DiskInfo> {
        let conn = self.ready_connection("query disk info")?;
        let max_data = Self::max_transaction_data(conn);
        let request = Transaction2Request::new(
            Trans2Subcommand::QueryFsInformation,
            smb1_msg::query_fs_size_params(),
            max_data,
        );
        let response = conn.send_recv(&request).await?.expect_success()?;
        let t2 = Transaction2Response::parse(&response.words, &response.raw)?;
        let info = FsSizeInfo::parse(&t2.data)?;
        let total_bytes = info.total_bytes();
        let free_bytes = info.free_bytes();
        Ok(DiskInfo {
            total_bytes,
            free_bytes,
            used_bytes: total_bytes.saturating_sub(free_bytes),
        })
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("ip", &self.ip)
            .field("server_name", &self.server_name)
            .field("state", &self.state())
            .finish()
    }
}
