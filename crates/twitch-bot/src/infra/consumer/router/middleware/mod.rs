pub mod logger_middleware;
