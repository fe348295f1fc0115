pub mod sunat;
