#![forbid(unsafe_code)]

//! sundby CLI: bind, decode, sign and verify signed XML envelopes.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use http::Method;
use std::path::{Path, PathBuf};
use std::process;
use sundby_binding::{BindingRequest, MessageRole, PostBinding, ProtocolMessage};
use sundby_core::{algorithm, Error};
use sundby_dsig::{DsigContext, SerializerConfig, VerifyResult};
use sundby_keys::{Key, KeyData, KeyInfoOptions, KeysManager, SigningCredential};
use sundby_xml::document::DEFAULT_ID_ATTRS;
use sundby_xml::XmlDocument;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "sundby",
    about = "Signed XML envelopes over the HTTP-POST binding",
    version
)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Role {
    Request,
    Response,
}

impl From<Role> for MessageRole {
    fn from(role: Role) -> Self {
        match role {
            Role::Request => MessageRole::Request,
            Role::Response => MessageRole::Response,
        }
    }
}

#[derive(clap::Args)]
struct SigningArgs {
    /// Signing key (PEM or DER, auto-detected)
    #[arg(short = 'k', long, env = "SUNDBY_KEY")]
    key: Option<PathBuf>,

    /// Raw HMAC key (binary file)
    #[arg(long = "hmac-key", conflicts_with = "key")]
    hmac_key: Option<PathBuf>,

    /// Certificate chain (PEM) to publish in KeyInfo
    #[arg(long)]
    cert: Option<PathBuf>,

    /// Signature algorithm URI (default: chosen from the key type)
    #[arg(long)]
    algorithm: Option<String>,

    /// Digest algorithm URI (default: paired with the signature algorithm)
    #[arg(long)]
    digest: Option<String>,

    /// ID of the signed root element (default: the root's ID attribute)
    #[arg(long = "reference-id")]
    reference_id: Option<String>,

    /// Namespace prefixes treated inclusively by exclusive c14n
    #[arg(long = "inclusive-prefix")]
    inclusive_prefixes: Vec<String>,

    /// Publish the public key value in KeyInfo
    #[arg(long = "key-value")]
    key_value: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Wrap an XML message into an auto-submitting HTML form
    Encode {
        /// Message XML file
        file: PathBuf,

        /// URL the form posts to
        #[arg(short, long)]
        destination: String,

        /// Message role (default: Response if the root name ends in "Response")
        #[arg(long, value_enum)]
        role: Option<Role>,

        /// Relay state to carry alongside the message
        #[arg(long = "relay-state")]
        relay_state: Option<String>,

        /// Print only the base64 payload
        #[arg(long = "payload-only")]
        payload_only: bool,

        #[command(flatten)]
        signing: SigningArgs,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Decode a posted message and print its XML
    Decode {
        /// Base64 field value; read a urlencoded form body with --form instead
        value: Option<String>,

        /// File holding an application/x-www-form-urlencoded POST body
        #[arg(long, conflicts_with = "value")]
        form: Option<PathBuf>,

        /// Form field the value came from
        #[arg(long, value_enum, default_value = "response")]
        role: Role,
    },

    /// Enveloped-sign an existing XML document
    Sign {
        /// Input XML file
        file: PathBuf,

        #[command(flatten)]
        signing: SigningArgs,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Verify an enveloped signature
    Verify {
        /// Input XML file
        file: PathBuf,

        /// Verification key (PEM or DER, auto-detected)
        #[arg(short = 'k', long)]
        key: Option<PathBuf>,

        /// Load key with a name (NAME:FILE)
        #[arg(short = 'K', long = "key-name")]
        key_name: Vec<String>,

        /// Load X.509 certificate (PEM or DER)
        #[arg(long)]
        cert: Option<PathBuf>,

        /// Load raw HMAC key (binary file)
        #[arg(long = "hmac-key")]
        hmac_key: Option<PathBuf>,

        /// Register additional ID attribute names
        #[arg(long = "id-attr")]
        id_attr: Vec<String>,

        /// Accept key material carried inline in KeyInfo
        #[arg(long = "trust-inline-keys")]
        trust_inline_keys: bool,
    },

    /// List supported algorithms and key types
    Info,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Encode {
            file,
            destination,
            role,
            relay_state,
            payload_only,
            signing,
            output,
        } => cmd_encode(file, destination, role, relay_state, payload_only, signing, output),
        Commands::Decode { value, form, role } => cmd_decode(value, form, role),
        Commands::Sign {
            file,
            signing,
            output,
        } => cmd_sign(file, signing, output),
        Commands::Verify {
            file,
            key,
            key_name,
            cert,
            hmac_key,
            id_attr,
            trust_inline_keys,
        } => cmd_verify(file, key, key_name, cert, hmac_key, id_attr, trust_inline_keys),
        Commands::Info => cmd_info(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn cmd_encode(
    file: PathBuf,
    destination: String,
    role: Option<Role>,
    relay_state: Option<String>,
    payload_only: bool,
    signing: SigningArgs,
    output: Option<PathBuf>,
) -> Result<(), Error> {
    let xml = read_file(&file)?;
    let document = XmlDocument::parse(xml.clone())?;
    let role = match role {
        Some(role) => role.into(),
        None if document.root_name().ends_with("Response") => MessageRole::Response,
        None => MessageRole::Request,
    };

    let mut message = ProtocolMessage::new(role, destination, xml)?;
    if let Some(relay_state) = relay_state {
        message = message.with_relay_state(relay_state);
    }
    if let Some(credential) = signing.credential()? {
        let reference_id = match &signing.reference_id {
            Some(id) => id.clone(),
            None => root_id(&document)?,
        };
        message = message
            .with_signing(credential, reference_id)?
            .with_serializer_config(signing.serializer_config());
    }

    let bound = PostBinding::new().bind(&message)?;
    if payload_only {
        write_output(output, bound.payload.as_bytes())
    } else {
        write_output(output, bound.html.as_bytes())
    }
}

fn cmd_decode(value: Option<String>, form: Option<PathBuf>, role: Role) -> Result<(), Error> {
    let request = match (value, form) {
        (_, Some(path)) => {
            let body = std::fs::read(&path)
                .map_err(|e| Error::Other(format!("{}: {e}", path.display())))?;
            BindingRequest::from_urlencoded(Method::POST, &body)
        }
        (Some(value), None) => {
            BindingRequest::post([(MessageRole::from(role).field_name(), value)])
        }
        (None, None) => return Err(Error::Other("give a field value or --form".into())),
    };

    let result = PostBinding::new().unbind(&request)?;
    if let Some(relay_state) = result.relay_state() {
        eprintln!("RelayState: {relay_state}");
    }
    write_output(None, result.xml().as_bytes())
}

fn cmd_sign(file: PathBuf, signing: SigningArgs, output: Option<PathBuf>) -> Result<(), Error> {
    let xml = read_file(&file)?;
    let credential = signing
        .credential()?
        .ok_or_else(|| Error::Other("a signing key is required (--key or --hmac-key)".into()))?;
    let (signed, envelope) = sundby_dsig::sign_document(
        &xml,
        &credential,
        signing.reference_id.as_deref(),
        signing.serializer_config(),
    )?;
    tracing::info!(
        offset = envelope.signature_offset,
        len = envelope.signature_len,
        "signed {}",
        file.display()
    );
    write_output(output, signed.as_bytes())
}

fn cmd_verify(
    file: PathBuf,
    key: Option<PathBuf>,
    key_name: Vec<String>,
    cert: Option<PathBuf>,
    hmac_key: Option<PathBuf>,
    id_attr: Vec<String>,
    trust_inline_keys: bool,
) -> Result<(), Error> {
    let xml = read_file(&file)?;
    let mut ctx = DsigContext::new(build_keys_manager(key, key_name, cert, hmac_key)?);
    ctx.trust_inline_keys = trust_inline_keys;
    for attr in &id_attr {
        ctx.add_id_attr(attr);
    }

    match sundby_dsig::verify(&ctx, &xml)? {
        VerifyResult::Valid { signed_id } => {
            println!("OK #{signed_id}");
            Ok(())
        }
        VerifyResult::Invalid { reason } => {
            eprintln!("INVALID: {reason}");
            process::exit(1);
        }
    }
}

fn cmd_info() -> Result<(), Error> {
    println!("sundby: signed XML envelopes over the HTTP-POST binding");
    println!();
    println!("Digest algorithms:");
    for uri in algorithm::DIGESTS {
        println!("  {uri}");
    }
    println!();
    println!("Signature algorithms:");
    for uri in algorithm::ASYMMETRIC_SIGNATURES
        .iter()
        .chain(algorithm::SYMMETRIC_SIGNATURES)
    {
        println!("  {uri}");
    }
    println!();
    println!("Canonicalization:");
    println!("  {}", algorithm::EXC_C14N);
    println!();
    println!("Key formats:");
    println!("  PEM, DER (RSA, EC P-256/P-384, PKCS#8, SPKI, X.509), raw binary (HMAC)");
    Ok(())
}

impl SigningArgs {
    fn credential(&self) -> Result<Option<SigningCredential>, Error> {
        let key = match (&self.key, &self.hmac_key) {
            (Some(path), _) => sundby_keys::loader::load_key_file(path)?,
            (None, Some(path)) => {
                let bytes = std::fs::read(path)
                    .map_err(|e| Error::Other(format!("{}: {e}", path.display())))?;
                sundby_keys::loader::load_hmac_key(&bytes)?
            }
            (None, None) => return Ok(None),
        };
        let key = match &self.cert {
            Some(path) => {
                let pem = std::fs::read(path)
                    .map_err(|e| Error::Other(format!("{}: {e}", path.display())))?;
                key.with_x509_chain(sundby_keys::loader::load_x509_chain_pem(&pem)?)
            }
            None => key,
        };

        let signature_algorithm = match &self.algorithm {
            Some(uri) => uri.clone(),
            None => default_signature_algorithm(&key)?.to_owned(),
        };
        let mut credential =
            SigningCredential::new(sundby_keys::into_security_key(key)?, signature_algorithm)
                .with_key_info(Some(KeyInfoOptions {
                    key_value: self.key_value,
                    ..KeyInfoOptions::default()
                }));
        if let Some(digest) = &self.digest {
            credential = credential.with_digest_algorithm(digest.as_str());
        }
        Ok(Some(credential))
    }

    fn serializer_config(&self) -> SerializerConfig {
        SerializerConfig::default().with_inclusive_prefixes(self.inclusive_prefixes.iter())
    }
}

fn default_signature_algorithm(key: &Key) -> Result<&'static str, Error> {
    match key.data {
        KeyData::Rsa { .. } => Ok(algorithm::RSA_SHA256),
        KeyData::EcP256 { .. } => Ok(algorithm::ECDSA_SHA256),
        KeyData::EcP384 { .. } => Ok(algorithm::ECDSA_SHA384),
        KeyData::Hmac(_) => Ok(algorithm::HMAC_SHA256),
        KeyData::Aes(_) => Err(Error::Key("AES keys cannot sign".into())),
    }
}

fn root_id(document: &XmlDocument) -> Result<String, Error> {
    let doc = document.parse_doc()?;
    let root = doc.root_element();
    DEFAULT_ID_ATTRS
        .iter()
        .find_map(|name| root.attribute(*name))
        .map(str::to_owned)
        .ok_or_else(|| Error::Other("root element has no ID attribute; pass --reference-id".into()))
}

// ── Utility functions ────────────────────────────────────────────────

fn read_file(path: &Path) -> Result<String, Error> {
    std::fs::read_to_string(path).map_err(|e| Error::Other(format!("{}: {e}", path.display())))
}

fn write_output(path: Option<PathBuf>, data: &[u8]) -> Result<(), Error> {
    match path {
        Some(p) => std::fs::write(&p, data).map_err(|e| Error::Other(format!("{}: {e}", p.display()))),
        None => {
            use std::io::Write;
            std::io::stdout()
                .write_all(data)
                .map_err(|e| Error::Other(format!("stdout: {e}")))
        }
    }
}

fn build_keys_manager(
    key_path: Option<PathBuf>,
    key_names: Vec<String>,
    cert_path: Option<PathBuf>,
    hmac_key_path: Option<PathBuf>,
) -> Result<KeysManager, Error> {
    let mut mgr = KeysManager::new();

    if let Some(path) = key_path {
        mgr.add_key(sundby_keys::loader::load_key_file(&path)?);
    }

    // NAME:FILE
    for spec in &key_names {
        let (name, file) = spec.split_once(':').ok_or_else(|| {
            Error::Other(format!("invalid key-name format: {spec} (expected NAME:FILE)"))
        })?;
        mgr.add_key(sundby_keys::loader::load_key_file(Path::new(file))?.with_name(name));
    }

    if let Some(path) = cert_path {
        mgr.add_key(sundby_keys::loader::load_key_file(&path)?);
    }

    if let Some(path) = hmac_key_path {
        let bytes = std::fs::read(&path)
            .map_err(|e| Error::Other(format!("{}: {e}", path.display())))?;
        mgr.add_key(sundby_keys::loader::load_hmac_key(&bytes)?);
    }

    Ok(mgr)
}
