//! Listening socket setup and the poll(2) event loop.
//!
//! Ground truth: `common/socket.cxx`'s `Socket` (construction, `SO_REUSEADDR`,
//! `bind`) and `server/server.cxx`'s `Server::run`/`acceptNewConn`/`connPut`
//! (the fd-indexed connection registry, `pollfd` vector rebuilt every
//! iteration, accept-until-EAGAIN). `makeNonBlocking` there becomes
//! `set_nonblocking` here.

use std::io;
use std::mem;
use std::net::Ipv4Addr;

use log::{debug, info, warn};

use crate::conn::{ConnState, Connection, WantEvents};
use crate::entry::Namespace;

pub struct Server {
    listener_fd: i32,
    /// Indexed by fd, mirroring the original's `fd2Conn` vector. `None`
    /// means no live connection at that fd.
    conns: Vec<Option<Connection>>,
    ns: Namespace,
}

impl Server {
    /// Bind a non-blocking TCP listener on `bind_addr:port` with
    /// `SO_REUSEADDR` set, matching `Socket::setOptions`/`bindToPort`.
    pub fn bind(bind_addr: Ipv4Addr, port: u16) -> io::Result<Self> {
        let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_STREAM, 0) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }

        let reuse: libc::c_int = 1;
        let rc = unsafe {
            libc::setsockopt(
                fd,
                libc::SOL_SOCKET,
                libc::SO_REUSEADDR,
                &reuse as *const _ as *const libc::c_void,
                mem::size_of::<libc::c_int>() as libc::socklen_t,
            )
        };
        if rc != 0 {
            let err = io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(err);
        }

        let mut addr: libc::sockaddr_in = unsafe { mem::zeroed() };
        addr.sin_family = libc::AF_INET as libc::sa_family_t;
        addr.sin_port = port.to_be();
        addr.sin_addr.s_addr = u32::from(bind_addr).to_be();

        let rc = unsafe {
            libc::bind(
                fd,
                &addr as *const libc::sockaddr_in as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
            )
        };
        if rc != 0 {
            let err = io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(err);
        }

        if unsafe { libc::listen(fd, libc::SOMAXCONN) } != 0 {
            let err = io::Error::last_os_error();
            unsafe { libc::close(fd) };
            return Err(err);
        }

        set_nonblocking(fd)?;
        info!("listening on {bind_addr}:{port}");

        Ok(Server { listener_fd: fd, conns: Vec::new(), ns: Namespace::new() })
    }

    fn conn_put(&mut self, conn: Connection) {
        let fd = conn.fd() as usize;
        if self.conns.len() <= fd {
            self.conns.resize_with(fd + 1, || None);
        }
        self.conns[fd] = Some(conn);
    }

    fn accept_new_conn(&mut self) -> io::Result<()> {
        loop {
            let fd = unsafe { libc::accept(self.listener_fd, std::ptr::null_mut(), std::ptr::null_mut()) };
            if fd < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::WouldBlock {
                    return Ok(());
                }
                return Err(err);
            }
            set_nonblocking(fd)?;
            debug!("accepted connection on fd {fd}");
            self.conn_put(Connection::new(fd));
        }
    }

    /// Run the event loop forever. One iteration: build the pollfd list
    /// from the listener plus every live connection, poll with a 1s
    /// timeout, then drive whichever fds came back ready.
    pub fn run(&mut self) -> io::Result<()> {
        loop {
            let mut pollfds = Vec::with_capacity(1 + self.conns.len());
            pollfds.push(libc::pollfd { fd: self.listener_fd, events: libc::POLLIN, revents: 0 });

            for conn in self.conns.iter().flatten() {
                let events = match conn.want_events() {
                    WantEvents::Readable => libc::POLLIN,
                    WantEvents::Writable => libc::POLLOUT,
                    WantEvents::None => 0,
                };
                pollfds.push(libc::pollfd { fd: conn.fd(), events: events | libc::POLLERR, revents: 0 });
            }

            let rc = unsafe {
                libc::poll(pollfds.as_mut_ptr(), pollfds.len() as libc::nfds_t, 1000)
            };
            if rc < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                warn!("poll() error: {err}");
                continue;
            }

            for pfd in pollfds.iter().skip(1) {
                if pfd.revents == 0 {
                    continue;
                }
                let fd = pfd.fd as usize;
                if let Some(conn) = self.conns[fd].as_mut() {
                    conn.io(&mut self.ns);
                    if conn.state() == ConnState::Closed {
                        debug!("closing connection on fd {fd}");
                        self.conns[fd] = None;
                    }
                }
            }

            if pollfds[0].revents != 0 {
                if let Err(e) = self.accept_new_conn() {
                    warn!("accept() error: {e}");
                }
            }
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        unsafe {
            libc::close(self.listener_fd);
        }
    }
}

fn set_nonblocking(fd: i32) -> io::Result<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL, 0) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    if unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
