use std::{fs, path::PathBuf};

use structopt::StructOpt;
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use mni::{
    DocumentQueryRequest, ProcessQueryRequest, QueryService, ServiceConfig,
};

#[derive(Debug, Error)]
enum Error {
    #[error("{0}")]
    Usage(String),

    #[error(transparent)]
    Service(#[from] mni::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(StructOpt)]
#[structopt(name = "mni", about = "Consulta processual via MNI (SOAP)")]
struct Args {
    #[structopt(subcommand)]
    command: Command,
}

#[derive(StructOpt)]
enum Command {
    /// Consulta os dados de um processo judicial
    Consultar {
        /// Numero do processo (20 digitos, com ou sem formatacao)
        numero: String,

        #[structopt(long)]
        data_inicial: Option<String>,

        #[structopt(long)]
        data_final: Option<String>,

        /// Incluir as partes do processo
        #[structopt(long)]
        partes: bool,

        /// Incluir os enderecos das partes
        #[structopt(long)]
        enderecos: bool,

        #[structopt(long)]
        sem_cabecalho: bool,

        #[structopt(long)]
        sem_movimentos: bool,

        #[structopt(long)]
        sem_documentos: bool,
    },

    /// Baixa documentos de um processo para o disco
    Documentos {
        numero: String,

        /// IDs dos documentos a baixar
        #[structopt(required = true)]
        ids: Vec<String>,

        /// Diretorio de saida
        #[structopt(long, default_value = ".")]
        saida: PathBuf,
    },

    /// Mostra os envelopes XML de requisicao e resposta
    Xml { numero: String },
}

fn sanitize_process_number(input: &str) -> Result<String, Error> {
    let digits: String = input.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.len() != 20 {
        return Err(Error::Usage(format!(
            "o numero do processo deve ter 20 digitos (recebidos: {})",
            digits.len()
        )));
    }

    Ok(digits)
}

fn extension_for(mimetype: &str) -> &'static str {
    match mimetype {
        "application/pdf" => "pdf",
        "text/html" => "html",
        "text/plain" => "txt",
        "application/msword" => "doc",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => "docx",
        "image/jpeg" => "jpg",
        "image/png" => "png",
        _ => "bin",
    }
}

#[paw::main]
fn main(args: Args) -> Result<(), Error> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ServiceConfig::from_env()?;
    let mut service = QueryService::connect(config)?;

    match args.command {
        Command::Consultar {
            numero,
            data_inicial,
            data_final,
            partes,
            enderecos,
            sem_cabecalho,
            sem_movimentos,
            sem_documentos,
        } => {
            let mut request = ProcessQueryRequest::new(sanitize_process_number(&numero)?);
            request.initial_date = data_inicial;
            request.final_date = data_final;
            request.include_parties = partes;
            request.include_addresses = enderecos;
            request.include_header = !sem_cabecalho;
            request.include_movements = !sem_movimentos;
            request.include_documents = !sem_documentos;

            let result = service.query_process(&request)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }

        Command::Documentos { numero, ids, saida } => {
            let request = DocumentQueryRequest::new(sanitize_process_number(&numero)?, ids);
            let result = service.query_documents(&request)?;

            if !result.success {
                return Err(Error::Usage(format!(
                    "erro ao baixar documentos: {}",
                    result.error.unwrap_or_else(|| "erro desconhecido".to_owned())
                )));
            }

            if result.documents.is_empty() {
                warn!("nenhum documento encontrado");
            }

            for document in &result.documents {
                let id = document.id.as_deref().unwrap_or("sem-id");
                let content = match &document.content {
                    Some(content) => content,
                    None => {
                        warn!("documento {id} sem conteudo, ignorando");
                        continue;
                    }
                };

                let mimetype = document.mimetype.as_deref().unwrap_or("application/octet-stream");
                let path = saida.join(format!("documento_{id}.{}", extension_for(mimetype)));
                fs::write(&path, content)?;
                info!("documento {id} salvo em {}", path.display());
            }
        }

        Command::Xml { numero } => {
            let request = ProcessQueryRequest::new(sanitize_process_number(&numero)?);
            let exchange = service.query_process_raw_xml(&request)?;

            println!("--- requisicao ---");
            println!("{}", exchange.request_xml);

            match exchange.response_xml {
                Some(response) => {
                    println!("--- resposta ---");
                    println!("{response}");
                }
                None => {
                    if let Some(error) = exchange.error {
                        println!("--- erro ---");
                        println!("{error}");
                    }
                }
            }
        }
    }

    Ok(())
}
