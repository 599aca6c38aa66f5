use std::ops::RangeInclusive;

use clap::{Parser, Subcommand};
use rand::Rng;

/// Ports a generated listen address is picked from
pub const PORT_RANGE: RangeInclusive<u16> = 1000..=56534;

#[derive(Parser, Debug)]
#[command(
    name = "revtcp",
    version,
    about = "command-line utility for managing tcp reverse proxies"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// start a reverse proxy server
    #[command(visible_aliases = ["s", "srv"])]
    Serve {
        /// listen address
        #[arg(
            long,
            short = 'l',
            visible_alias = "from",
            visible_short_alias = 'f',
            env = "REVTCP_LISTEN"
        )]
        listen: Option<String>,

        /// origin server address
        #[arg(long, short = 't', env = "REVTCP_TO")]
        to: String,
    },

    /// start a tcp echo server
    #[command(visible_alias = "echosrv")]
    EchoServer {
        /// listen address
        #[arg(
            long,
            short = 'l',
            visible_alias = "port",
            visible_short_alias = 'p',
            env = "REVTCP_LISTEN"
        )]
        listen: Option<String>,
    },
}

/// returns the given listen address, or generates one on all interfaces
pub fn listen_or_generate<R>(listen: Option<String>, rng: &mut R) -> String
where
    R: Rng + ?Sized,
{
    listen.unwrap_or_else(|| generate_listen_address(rng))
}

pub fn generate_listen_address<R>(rng: &mut R) -> String
where
    R: Rng + ?Sized,
{
    format!("0.0.0.0:{}", rng.gen_range(PORT_RANGE))
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use rand::{rngs::StdRng, SeedableRng};

    use super::{generate_listen_address, listen_or_generate, Cli, Command, PORT_RANGE};

    #[test]
    fn generated_ports_stay_in_range() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for _ in 0..10_000 {
            let addr = generate_listen_address(&mut rng);
            let port = addr
                .strip_prefix("0.0.0.0:")
                .and_then(|port| port.parse::<u16>().ok())
                .unwrap();
            assert!(PORT_RANGE.contains(&port), "{} is out of range", addr);
        }
    }

    #[test]
    fn explicit_listen_address_wins() {
        let mut rng = StdRng::seed_from_u64(1);
        let addr = listen_or_generate(Some("127.0.0.1:3600".into()), &mut rng);
        assert_eq!(addr, "127.0.0.1:3600");
    }

    #[test]
    fn parse_serve() {
        let cli = Cli::try_parse_from([
            "revtcp",
            "serve",
            "--listen",
            "0.0.0.0:80",
            "--to",
            "10.0.0.1:8080",
        ])
        .unwrap();
        assert_eq!(
            cli.command,
            Command::Serve {
                listen: Some("0.0.0.0:80".into()),
                to: "10.0.0.1:8080".into(),
            }
        );

        let cli =
            Cli::try_parse_from(["revtcp", "srv", "-f", "0.0.0.0:80", "-t", "10.0.0.1:8080"])
                .unwrap();
        assert_eq!(
            cli.command,
            Command::Serve {
                listen: Some("0.0.0.0:80".into()),
                to: "10.0.0.1:8080".into(),
            }
        );
    }

    #[test]
    fn serve_requires_a_destination() {
        assert!(Cli::try_parse_from(["revtcp", "serve", "--from", "0.0.0.0:80"]).is_err());
    }

    #[test]
    fn parse_echo_server() {
        let cli = Cli::try_parse_from(["revtcp", "echosrv", "--port", "127.0.0.1:7"]).unwrap();
        assert_eq!(
            cli.command,
            Command::EchoServer {
                listen: Some("127.0.0.1:7".into()),
            }
        );
    }
}
